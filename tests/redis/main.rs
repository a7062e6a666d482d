mod commands;
mod handshake;
mod test_utils;
