mod codec;
mod harness;
mod send_queue;
mod session;
