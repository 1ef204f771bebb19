mod log_ring;
