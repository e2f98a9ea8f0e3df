//! Integration tests for the login relay.
//! These drive the public API with scripted backend collaborators.


mod retry_test;
mod scenarios_test;
