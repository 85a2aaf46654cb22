pub mod appointment;
pub mod doctor;
pub mod followup;
pub mod message;
pub mod patient;
pub mod reminder;

pub use appointment::MongoAppointmentRepository;
pub use doctor::MongoDoctorRepository;
pub use followup::MongoFollowupRepository;
pub use message::MongoProcessedMessageRepository;
pub use patient::MongoPatientRepository;
pub use reminder::MongoReminderRepository;
