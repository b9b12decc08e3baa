mod health_tests;
mod message_tests;
mod session_tests;
