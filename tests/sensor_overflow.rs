use motor_driver_sim::registers::{RegisterFile, REG_SENSOR_STATUS, SENSOR_STATUS_OVERFLOW};
use motor_driver_sim::sensors::{SensorArray, RING_CAPACITY};

#[test]
fn fifteen_pushes_succeed_and_the_sixteenth_sets_overflow() {
    let mut rf = RegisterFile::new();
    let mut sensors = SensorArray::new(&mut rf);

    for i in 0..(RING_CAPACITY - 1) {
        assert!(sensors.ring_mut().push(i as i32));
    }
    assert!(!sensors.ring_mut().push(999));

    rf.set_bits(REG_SENSOR_STATUS, SENSOR_STATUS_OVERFLOW);
    assert_ne!(rf.read(REG_SENSOR_STATUS) & SENSOR_STATUS_OVERFLOW, 0);
}

#[test]
fn continuous_sampling_drains_into_the_ring_until_it_overflows() {
    let mut rf = RegisterFile::new();
    let mut sensors = SensorArray::new(&mut rf);
    sensors.enable(&mut rf);
    sensors.set_continuous(&mut rf, true);

    for _ in 0..RING_CAPACITY {
        sensors.trigger(&mut rf);
        sensors.update(&mut rf);
    }

    assert_ne!(rf.read(REG_SENSOR_STATUS) & SENSOR_STATUS_OVERFLOW, 0);
}
