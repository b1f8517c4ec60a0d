//! Markup for the modal dialogs. The webview styles these; only the element
//! ids and `data-action` attributes matter to the core.

use crate::auth::AuthUser;

/// Local preferences shown in the settings dialog.
#[derive(Debug, Clone, PartialEq)]
pub struct SettingsValues {
    pub timer_minutes: u64,
    pub dark_mode: bool,
    pub font_family: Option<String>,
}

pub const FONT_CHOICES: [&str; 4] = ["System", "Georgia", "Inter", "Courier New"];

fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}

fn preferences(values: &SettingsValues) -> String {
    let fonts: String = FONT_CHOICES
        .iter()
        .map(|font| {
            let selected = values.font_family.as_deref() == Some(*font);
            format!(
                r#"<option value="{font}"{}>{font}</option>"#,
                if selected { " selected" } else { "" }
            )
        })
        .collect();

    format!(
        r#"<section class="settings-preferences">
  <label for="settings-minutes">Timer (minutes)</label>
  <input id="settings-minutes" type="number" min="1" value="{minutes}" data-action="setTimerMinutes">
  <label><input id="settings-dark-mode" type="checkbox"{dark} data-action="toggleDarkMode"> Dark mode</label>
  <select id="settings-font" data-action="setFontFamily">{fonts}</select>
</section>"#,
        minutes = values.timer_minutes,
        dark = if values.dark_mode { " checked" } else { "" },
    )
}

/// Settings for someone who is not signed in: preferences plus the sign-in
/// and sign-up forms.
pub fn settings_anonymous(values: &SettingsValues, providers: &[String]) -> String {
    let oauth: String = providers
        .iter()
        .map(|provider| {
            let provider = escape(provider);
            format!(
                r#"<button class="oauth" data-action="oAuth" data-provider="{provider}">Continue with {provider}</button>"#
            )
        })
        .collect();

    format!(
        r#"<h2>Settings</h2>
{prefs}
<section class="settings-account">
  <input id="auth-email" type="email" placeholder="Email">
  <input id="auth-password" type="password" placeholder="Password">
  <button data-action="signIn">Sign in</button>
  <button data-action="signUp">Create account</button>
  <button class="link" data-action="magicLink">Email me a login link</button>
  <button class="link" data-action="resetPassword">Forgot password?</button>
  <div class="oauth-providers">{oauth}</div>
</section>"#,
        prefs = preferences(values),
    )
}

pub fn settings_signed_in(values: &SettingsValues, user: &AuthUser) -> String {
    format!(
        r#"<h2>Settings</h2>
{prefs}
<section class="settings-account">
  <p>Signed in as <strong>{email}</strong></p>
  <button data-action="signOut">Sign out</button>
</section>"#,
        prefs = preferences(values),
        email = escape(&user.email),
    )
}

pub fn feedback_form() -> String {
    r#"<h2>Feedback</h2>
<textarea id="feedback-message" rows="5" placeholder="What would make this better?"></textarea>
<button data-action="sendFeedback">Send</button>"#
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values() -> SettingsValues {
        SettingsValues {
            timer_minutes: 20,
            dark_mode: true,
            font_family: Some("Georgia".into()),
        }
    }

    #[test]
    fn anonymous_settings_list_configured_providers() {
        let html = settings_anonymous(&values(), &["github".into()]);
        assert!(html.contains(r#"data-provider="github""#));
        assert!(!html.contains("google"));
        assert!(html.contains(r#"value="20""#));
        assert!(html.contains(r#"<option value="Georgia" selected>"#));
    }

    #[test]
    fn user_email_is_escaped() {
        let user = AuthUser {
            id: "u1".into(),
            email: "<b>@x.io".into(),
            provider: "email".into(),
        };
        let html = settings_signed_in(&values(), &user);
        assert!(html.contains("&lt;b&gt;@x.io"));
        assert!(html.contains(r#"data-action="signOut""#));
    }
}
