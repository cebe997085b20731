mod test_close_releases_port;
mod test_failover_reelects;
mod test_stalled_reader;
