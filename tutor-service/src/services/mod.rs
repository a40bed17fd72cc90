pub mod metrics;
pub mod providers;
pub mod request_builder;
pub mod response_extractor;
pub mod retry;
pub mod tutor;

pub use tutor::TutorService;
