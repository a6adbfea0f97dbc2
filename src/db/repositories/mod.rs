mod history;
mod progress;
mod responses;
mod study_log;
mod uploads;
mod videos;
