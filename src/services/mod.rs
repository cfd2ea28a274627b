pub mod amount;
pub mod pending;
pub mod rates;
pub mod reservation;
pub mod transfer;

pub use pending::{ConfirmOutcome, PendingService};
pub use rates::RateService;
pub use reservation::ReservationService;
pub use transfer::TransferService;
