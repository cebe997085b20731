mod test_room_scenario;
mod test_unbound_hardware_is_opaque;
