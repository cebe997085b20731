mod test_client_announces_room;
mod test_race_elects_one_server;
