pub mod patient_session;
