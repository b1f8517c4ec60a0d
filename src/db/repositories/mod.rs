mod accounts;
mod feedback;
mod kv;
mod profiles;
mod responses;
mod sessions;
