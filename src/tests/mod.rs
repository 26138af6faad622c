//! Behavioural tests that drive a controller end to end through the
//! scripted backend.
