use std::{
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};

use anyhow::Result;
use tokio_util::sync::CancellationToken;

use crate::auth::AuthBoundary;
use crate::clock::Clock;
use crate::config::Timings;
use crate::dom::{
    Element, ElementCache, CLASS_AT_TOP, CLASS_FADE_OUT, CLASS_KEEP_VISIBLE, CLASS_SHOW,
};
use crate::history::{HistoryEntry, HistoryLog};
use crate::transition::TransitionCoordinator;
use crate::{log_debug, log_error, log_info, log_warn};

use super::{Prompt, QuestionType, ADVICE_LINES};

const ENABLE_LOGS: bool = true;

/// Where a selected prompt comes to rest.
const TOP_SLOT_PX: &str = "80px";
/// Inline properties used to pin a prompt while it moves.
const PINNED_STYLES: [&str; 4] = ["position", "top", "left", "width"];

/// The reflection sequence layered over the menu. Every delay and wait of a
/// run races the run's cancellation token, so nothing fires after `reset`.
pub struct QuestionsFlow {
    cache: Arc<ElementCache>,
    transitions: Arc<TransitionCoordinator>,
    backend: Arc<dyn AuthBoundary>,
    history: Arc<HistoryLog>,
    clock: Arc<dyn Clock>,
    timings: Timings,
    run: Mutex<CancellationToken>,
}

impl QuestionsFlow {
    pub fn new(
        cache: Arc<ElementCache>,
        transitions: Arc<TransitionCoordinator>,
        backend: Arc<dyn AuthBoundary>,
        history: Arc<HistoryLog>,
        clock: Arc<dyn Clock>,
        timings: Timings,
    ) -> Self {
        let idle = CancellationToken::new();
        idle.cancel();
        Self {
            cache,
            transitions,
            backend,
            history,
            clock,
            timings,
            run: Mutex::new(idle),
        }
    }

    fn lock_run(&self) -> MutexGuard<'_, CancellationToken> {
        match self.run.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn begin_run(&self) -> CancellationToken {
        let mut run = self.lock_run();
        run.cancel();
        *run = CancellationToken::new();
        run.clone()
    }

    fn current_run(&self) -> CancellationToken {
        self.lock_run().clone()
    }

    pub fn is_open(&self) -> bool {
        !self.current_run().is_cancelled()
    }

    async fn guarded<F>(&self, token: CancellationToken, label: &str, step: F)
    where
        F: std::future::Future<Output = Result<()>>,
    {
        tokio::select! {
            biased;
            _ = token.cancelled() => {
                log_debug!("Questions {label} cancelled");
            }
            result = step => {
                if let Err(err) = result {
                    log_error!("Questions {label} aborted: {err:#}");
                }
            }
        }
    }

    /// Fades the menu out and brings the prompts in one after another.
    pub async fn open(&self) {
        let token = self.begin_run();
        log_info!("Opening questions");
        self.guarded(token, "open", self.run_open()).await;
    }

    async fn run_open(&self) -> Result<()> {
        let fade = self
            .transitions
            .expect_transition(Element::MenuContent, Some("opacity"));
        self.cache.add_class(Element::MenuContent, CLASS_FADE_OUT)?;
        fade.wait(self.timings.fade_timeout()).await;

        self.cache.set_hidden(Element::QuestionsContainer, false)?;
        self.cache.add_class(Element::QuestionsContainer, CLASS_SHOW)?;
        for (index, prompt) in Prompt::ALL.into_iter().enumerate() {
            if index > 0 {
                tokio::time::sleep(self.timings.question_stagger()).await;
            }
            self.cache.add_class(Element::Prompt(prompt), CLASS_SHOW)?;
        }
        Ok(())
    }

    /// Focuses `prompt`: siblings fade away, it slides to the top slot, and
    /// its content is revealed.
    pub async fn select(&self, prompt: Prompt) {
        let token = self.current_run();
        if token.is_cancelled() {
            log_debug!("Ignoring {} selection while closed", prompt.as_str());
            return;
        }
        self.guarded(token, "selection", self.run_select(prompt)).await;
    }

    async fn run_select(&self, prompt: Prompt) -> Result<()> {
        let chosen = Element::Prompt(prompt);
        self.cache.add_class(chosen, CLASS_KEEP_VISIBLE)?;

        let siblings: Vec<Prompt> = Prompt::ALL
            .into_iter()
            .filter(|other| *other != prompt)
            .collect();
        let fades: Vec<_> = siblings
            .iter()
            .map(|sibling| {
                self.transitions
                    .expect_transition(Element::Prompt(*sibling), Some("opacity"))
            })
            .collect();
        for sibling in &siblings {
            self.cache.add_class(Element::Prompt(*sibling), CLASS_FADE_OUT)?;
        }
        let deadline = tokio::time::Instant::now() + self.timings.fade_timeout();
        for fade in fades {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            fade.wait(remaining.max(Duration::from_millis(1))).await;
        }

        let rect = self.cache.rect(chosen)?;
        self.cache.set_style(chosen, "position", Some("fixed"))?;
        self.cache.set_style(chosen, "top", Some(&format!("{:.0}px", rect.y)))?;
        self.cache.set_style(chosen, "left", Some(&format!("{:.0}px", rect.x)))?;
        self.cache.set_style(chosen, "width", Some(&format!("{:.0}px", rect.width)))?;
        self.cache.flush_layout(chosen)?;

        let moved = self.transitions.expect_transition(chosen, Some("top"));
        self.cache.add_class(chosen, CLASS_AT_TOP)?;
        self.cache.set_style(chosen, "top", Some(TOP_SLOT_PX))?;
        moved.wait(self.timings.fade_timeout()).await;

        let detail = Element::PromptDetail(prompt);
        self.cache.set_hidden(detail, false)?;
        self.cache.add_class(detail, CLASS_SHOW)?;
        self.cache.set_hidden(Element::HomeButton, false)?;

        match prompt {
            Prompt::HowItWorks => {}
            Prompt::BetterToday | Prompt::LifeMeaning => {
                if let Some(question) = prompt.question() {
                    self.cache.set_value(Element::AnswerInput(question), "")?;
                }
            }
            Prompt::Advice => {
                for (index, line) in ADVICE_LINES.iter().enumerate() {
                    if index > 0 {
                        tokio::time::sleep(self.timings.question_stagger()).await;
                    }
                    let element = Element::AdviceLine(index);
                    self.cache.set_text(element, line)?;
                    self.cache.add_class(element, CLASS_SHOW)?;
                }
            }
        }
        log_debug!("Prompt {} revealed", prompt.as_str());
        Ok(())
    }

    /// Records an answer locally and remotely, then returns to the menu if
    /// the run it was given in is still open. Blank answers are ignored.
    /// Returns whether the answer was recorded.
    pub async fn submit(&self, question: QuestionType, text: &str) -> bool {
        let text = text.trim();
        if text.is_empty() {
            log_debug!("Ignoring empty {question} answer");
            return false;
        }

        let run = self.current_run();
        if let Err(err) = self.backend.save_response(question, text).await {
            log_warn!("Remote save of {question} answer failed: {err}");
        }
        self.history
            .append(HistoryEntry::answer(self.clock.now(), question, text));
        // A run reopened while the save was in flight is left alone.
        if !run.is_cancelled() {
            self.reset();
        }
        true
    }

    /// Clicks that land outside any interactive child close the flow.
    pub fn background_click(&self, on_interactive: bool) {
        if !on_interactive && self.is_open() {
            self.reset();
        }
    }

    pub fn home(&self) {
        self.reset();
    }

    /// Cancels the current run and puts every element back the way the menu
    /// expects it.
    pub fn reset(&self) {
        self.lock_run().cancel();

        let mut steps: Vec<Result<()>> = Vec::new();
        for prompt in Prompt::ALL {
            let element = Element::Prompt(prompt);
            for property in PINNED_STYLES {
                steps.push(self.cache.set_style(element, property, None));
            }
            for class in [CLASS_SHOW, CLASS_KEEP_VISIBLE, CLASS_AT_TOP, CLASS_FADE_OUT] {
                steps.push(self.cache.remove_class(element, class));
            }
            let detail = Element::PromptDetail(prompt);
            steps.push(self.cache.remove_class(detail, CLASS_SHOW));
            steps.push(self.cache.set_hidden(detail, true));
        }
        for index in 0..ADVICE_LINES.len() {
            steps.push(self.cache.remove_class(Element::AdviceLine(index), CLASS_SHOW));
        }
        for question in QuestionType::ALL {
            steps.push(self.cache.set_value(Element::AnswerInput(question), ""));
        }
        steps.push(self.cache.remove_class(Element::QuestionsContainer, CLASS_SHOW));
        steps.push(self.cache.set_hidden(Element::QuestionsContainer, true));
        steps.push(self.cache.set_hidden(Element::HomeButton, true));
        steps.push(self.cache.remove_class(Element::MenuContent, CLASS_FADE_OUT));

        for err in steps.into_iter().filter_map(Result::err) {
            log_warn!("Questions reset skipped an element: {err:#}");
        }
        log_info!("Questions flow reset");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Harness;

    fn prompt_is_clean(harness: &Harness, prompt: Prompt) -> bool {
        let element = Element::Prompt(prompt);
        harness.dom.element_styles(element).is_empty()
            && [CLASS_SHOW, CLASS_KEEP_VISIBLE, CLASS_AT_TOP, CLASS_FADE_OUT]
                .into_iter()
                .all(|class| !harness.dom.element_has_class(element, class))
    }

    #[tokio::test(start_paused = true)]
    async fn prompts_appear_with_a_stagger() {
        let harness = Harness::new();
        let flow = harness.questions.clone();
        let opening = tokio::spawn(async move { flow.open().await });

        // Menu fade has no completion event, so it times out at 600ms.
        tokio::time::sleep(Duration::from_millis(650)).await;
        assert!(!harness.dom.element_hidden(Element::QuestionsContainer));
        assert!(harness.dom.element_has_class(Element::Prompt(Prompt::HowItWorks), CLASS_SHOW));
        assert!(!harness.dom.element_has_class(Element::Prompt(Prompt::BetterToday), CLASS_SHOW));

        tokio::time::sleep(Duration::from_millis(800)).await;
        assert!(harness.dom.element_has_class(Element::Prompt(Prompt::BetterToday), CLASS_SHOW));

        opening.await.unwrap();
        assert!(Prompt::ALL
            .into_iter()
            .all(|prompt| harness.dom.element_has_class(Element::Prompt(prompt), CLASS_SHOW)));
    }

    #[tokio::test(start_paused = true)]
    async fn selecting_pins_the_prompt_to_the_top() {
        let harness = Harness::new();
        harness.questions.open().await;
        harness.questions.select(Prompt::BetterToday).await;

        let chosen = Element::Prompt(Prompt::BetterToday);
        assert!(harness.dom.element_has_class(chosen, CLASS_KEEP_VISIBLE));
        assert!(harness.dom.element_has_class(chosen, CLASS_AT_TOP));
        assert_eq!(harness.dom.element_style(chosen, "top").as_deref(), Some("80px"));
        assert!(harness
            .dom
            .element_has_class(Element::Prompt(Prompt::Advice), CLASS_FADE_OUT));
        assert!(!harness.dom.element_hidden(Element::PromptDetail(Prompt::BetterToday)));
        assert!(harness.dom.element_hidden(Element::PromptDetail(Prompt::LifeMeaning)));
    }

    #[tokio::test(start_paused = true)]
    async fn advice_lines_are_revealed_in_turn() {
        let harness = Harness::new();
        harness.questions.open().await;
        harness.questions.select(Prompt::Advice).await;
        for index in 0..ADVICE_LINES.len() {
            assert!(harness.dom.element_has_class(Element::AdviceLine(index), CLASS_SHOW));
            assert_eq!(harness.dom.element_text(Element::AdviceLine(index)), ADVICE_LINES[index]);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn reset_mid_flow_clears_every_prompt() {
        let harness = Harness::new();
        harness.questions.open().await;
        let flow = harness.questions.clone();
        let selecting = tokio::spawn(async move { flow.select(Prompt::BetterToday).await });

        // Part way through: siblings fading, prompt already marked.
        tokio::time::sleep(Duration::from_millis(100)).await;
        harness.questions.reset();
        selecting.await.unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;

        for prompt in Prompt::ALL {
            assert!(prompt_is_clean(&harness, prompt), "{prompt:?} not reset");
            assert!(harness.dom.element_hidden(Element::PromptDetail(prompt)));
        }
        assert!(harness.dom.element_hidden(Element::QuestionsContainer));
        assert!(!harness.dom.element_has_class(Element::MenuContent, CLASS_FADE_OUT));
        assert!(!harness.questions.is_open());
    }

    #[tokio::test(start_paused = true)]
    async fn reset_after_selection_clears_pinned_styles() {
        let harness = Harness::new();
        harness.questions.open().await;
        harness.questions.select(Prompt::BetterToday).await;
        harness.questions.home();

        for prompt in Prompt::ALL {
            assert!(prompt_is_clean(&harness, prompt), "{prompt:?} not reset");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn reset_during_open_stops_the_stagger() {
        let harness = Harness::new();
        let flow = harness.questions.clone();
        let opening = tokio::spawn(async move { flow.open().await });

        tokio::time::sleep(Duration::from_millis(650)).await;
        harness.questions.background_click(false);
        opening.await.unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;

        assert!(Prompt::ALL
            .into_iter()
            .all(|prompt| !harness.dom.element_has_class(Element::Prompt(prompt), CLASS_SHOW)));
    }

    #[tokio::test(start_paused = true)]
    async fn clicks_on_interactive_children_keep_the_flow_open() {
        let harness = Harness::new();
        harness.questions.open().await;
        harness.questions.background_click(true);
        assert!(harness.questions.is_open());
        assert!(!harness.dom.element_hidden(Element::QuestionsContainer));
    }

    #[tokio::test(start_paused = true)]
    async fn submit_records_locally_and_remotely() {
        let harness = Harness::new();
        harness.questions.open().await;
        harness.questions.select(Prompt::BetterToday).await;

        assert!(
            harness
                .questions
                .submit(QuestionType::BetterToday, "  walk more  ")
                .await
        );

        let entries = harness.history.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].better_today.as_deref(), Some("walk more"));
        assert_eq!(entries[0].meaning, None);
        assert_eq!(
            harness.backend.responses(),
            vec![(QuestionType::BetterToday, "walk more".to_string())]
        );
        assert!(harness.dom.element_hidden(Element::QuestionsContainer));
    }

    #[tokio::test(start_paused = true)]
    async fn blank_answers_are_ignored() {
        let harness = Harness::new();
        assert!(!harness.questions.submit(QuestionType::LifeMeaning, "   ").await);
        assert!(harness.history.is_empty());
        assert!(harness.backend.responses().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn remote_failure_still_keeps_the_local_copy() {
        let harness = Harness::new();
        harness.backend.fail_with("offline");
        assert!(harness.questions.submit(QuestionType::LifeMeaning, "family").await);
        assert_eq!(harness.history.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_save_does_not_close_a_reopened_flow() {
        let harness = Harness::new();
        harness.backend.delay_saves(Duration::from_secs(3));
        harness.questions.open().await;
        harness.questions.select(Prompt::LifeMeaning).await;

        let flow = harness.questions.clone();
        let saving =
            tokio::spawn(async move { flow.submit(QuestionType::LifeMeaning, "family").await });
        tokio::time::sleep(Duration::from_millis(100)).await;

        harness.questions.home();
        harness.questions.open().await;
        assert!(harness.questions.is_open());

        assert!(saving.await.unwrap());
        assert_eq!(harness.history.len(), 1);
        assert!(harness.questions.is_open());
        assert!(!harness.dom.element_hidden(Element::QuestionsContainer));
    }
}
