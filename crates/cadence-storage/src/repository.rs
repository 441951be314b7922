//! Repository layer for data access

pub mod campaigns;
pub mod messages;

pub use campaigns::CampaignRepository;
pub use messages::MessageRepository;
