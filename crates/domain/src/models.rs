//! Model families with codec quirks.

/// Wireless brightness is `0..=0x64` rather than `0..=0xFF`.
pub const BLE_BRIGHTNESS_NO_SCALE: &[&str] = &[
    "H6002", "H6052", "H6058", "H6102", "H6113", "H6127", "H6159", "H6160", "H6163", "H6172",
    "H6175", "H6176", "H6181", "H6182", "H6188", "H6195", "H6196", "H6199", "H619A", "H7005",
    "H7020", "H7021", "H7028",
];

/// Wireless colour opcode prefix `0x0D`.
pub const BLE_COLOUR_D: &[&str] = &[
    "H6052", "H6058", "H6102", "H6113", "H613A", "H613B", "H613C", "H613D", "H613E", "H613F",
    "H6144", "H6159", "H617E", "H617F", "H618E", "H618F",
];

/// Wireless colour opcode prefix `0x15 0x01` with a segment trailer.
pub const BLE_COLOUR_1501: &[&str] = &[
    "H6072", "H6076", "H6079", "H6121", "H6141", "H6142", "H6143", "H6148", "H6167", "H6168",
    "H6172", "H6173", "H6175", "H6176", "H6182", "H6183", "H6186", "H6199", "H619A", "H619B",
    "H619C", "H619D", "H619E", "H61A0", "H61A1", "H61A2", "H61A3", "H61A5", "H61A8", "H61B2",
    "H61E1", "H7020", "H7021", "H7028", "H7041", "H7042", "H7050", "H7051", "H7052", "H7055",
    "H7060", "H7061", "H7062",
];

/// Outlets whose cloud power values are `17`/`16` rather than `1`/`0`.
pub const OUTLET_16_17: &[&str] = &["H5001", "H5080", "H5083"];

/// Dual switches reporting both outlets as a `0..=3` bitmask.
pub const SWITCH_DOUBLE: &[&str] = &["H5082", "H5086", "H5087", "H5161"];

#[must_use]
pub fn is_ble_brightness_no_scale(model: &str) -> bool {
    BLE_BRIGHTNESS_NO_SCALE.contains(&model)
}

#[must_use]
pub fn is_ble_colour_d(model: &str) -> bool {
    BLE_COLOUR_D.contains(&model)
}

#[must_use]
pub fn is_ble_colour_1501(model: &str) -> bool {
    BLE_COLOUR_1501.contains(&model)
}

#[must_use]
pub fn is_outlet_16_17(model: &str) -> bool {
    OUTLET_16_17.contains(&model)
}

#[must_use]
pub fn is_switch_double(model: &str) -> bool {
    SWITCH_DOUBLE.contains(&model)
}
