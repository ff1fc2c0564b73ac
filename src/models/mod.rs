pub mod gigs;
pub mod messages;
pub mod notifications;
pub mod order_statuses;
pub mod orders;
pub mod payment_transactions;
pub mod reviews;
pub mod rooms;
pub mod users;
pub mod withdrawal_requests;

