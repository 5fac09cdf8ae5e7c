mod test_session_dispatches_events;
mod test_webrtc_loopback_call;
