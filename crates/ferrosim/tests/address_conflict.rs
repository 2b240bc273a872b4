//! A second register mapping overlapping an existing one is rejected,
//! not silently accepted.

#[test]
fn overlapping_register_mapping_is_rejected() {
    let sim = ferrosim::Simulator::new().expect("simulator init");

    sim.add_register_mapping(0x4000_2000, 0x4000_2050, "uart0")
        .expect("first mapping succeeds");

    let err = sim
        .add_register_mapping(0x4000_2020, 0x4000_2070, "uart1")
        .expect_err("overlapping mapping must be rejected");

    assert!(matches!(err, ferrosim::SimError::Trap(_)));

    sim.cleanup();
}
