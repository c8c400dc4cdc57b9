pub mod repository;

pub use repository::BillingRepository;
