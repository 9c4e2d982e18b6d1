//! Wire tokens for measurement types and units.
//!
//! The broker identifies what a reported value measures by these short
//! tokens in the `type,unit=value` payload grammar. The set is fixed by the
//! cloud side; tokens are never invented on the device.

/// Placeholder unit emitted when a type is present but no unit applies.
pub const UNIT_UNDEFINED: &str = "null";

// Measurement types

pub const TYPE_ABSOLUTE_HUMIDITY: &str = "abs_hum";
pub const TYPE_ACCELERATION: &str = "accel";
pub const TYPE_ALTITUDE: &str = "alt";
pub const TYPE_BAROMETRIC_PRESSURE: &str = "bp";
pub const TYPE_BATTERY: &str = "batt";
pub const TYPE_BYTES: &str = "bytes";
pub const TYPE_CO2: &str = "co2";
pub const TYPE_CPU: &str = "cpu";
pub const TYPE_CURRENT: &str = "current";
pub const TYPE_DISTANCE: &str = "dist";
pub const TYPE_FREQUENCY: &str = "freq";
pub const TYPE_GAS: &str = "gas";
pub const TYPE_GPS: &str = "gps";
pub const TYPE_HUMIDITY: &str = "hum";
pub const TYPE_INTRUSION: &str = "intrusion";
pub const TYPE_LUMINOSITY: &str = "lum";
pub const TYPE_MEMORY: &str = "mem";
pub const TYPE_MOTION: &str = "motion";
pub const TYPE_POWER: &str = "pow";
pub const TYPE_PRESSURE: &str = "press";
pub const TYPE_PROXIMITY: &str = "prox";
pub const TYPE_RELATIVE_HUMIDITY: &str = "rel_hum";
pub const TYPE_RESISTANCE: &str = "res";
pub const TYPE_ROTATION: &str = "rot";
pub const TYPE_SIGNAL_STRENGTH: &str = "sig_str";
pub const TYPE_SOUND: &str = "sound";
pub const TYPE_SPEED: &str = "speed";
pub const TYPE_STEPS: &str = "steps";
pub const TYPE_STORAGE: &str = "storage";
pub const TYPE_TEMPERATURE: &str = "temp";
pub const TYPE_VOLTAGE: &str = "voltage";
pub const TYPE_VOLUME: &str = "vol";
pub const TYPE_WEIGHT: &str = "weight";

// Measurement units

pub const UNIT_AMP: &str = "a";
pub const UNIT_BYTE: &str = "byte";
pub const UNIT_CELSIUS: &str = "c";
pub const UNIT_CENTIMETER: &str = "cm";
pub const UNIT_DBM: &str = "dbm";
pub const UNIT_DEGREE: &str = "deg";
pub const UNIT_DIGITAL: &str = "d";
pub const UNIT_FAHRENHEIT: &str = "f";
pub const UNIT_FEET: &str = "ft";
pub const UNIT_GRAVITY: &str = "g";
pub const UNIT_HECTOPASCAL: &str = "hpa";
pub const UNIT_HERTZ: &str = "hz";
pub const UNIT_HOUR: &str = "hour";
pub const UNIT_KELVIN: &str = "k";
pub const UNIT_KILOGRAM: &str = "kg";
pub const UNIT_KILOHERTZ: &str = "khz";
pub const UNIT_KM_PER_H: &str = "kmh";
pub const UNIT_LITER: &str = "l";
pub const UNIT_LUX: &str = "lux";
pub const UNIT_METER: &str = "m";
pub const UNIT_METER_PER_SEC: &str = "mps";
pub const UNIT_MILLIMETER: &str = "mm";
pub const UNIT_MILLISECOND: &str = "msec";
pub const UNIT_MINUTE: &str = "min";
pub const UNIT_OHM: &str = "ohm";
pub const UNIT_PASCAL: &str = "pa";
pub const UNIT_PERCENT: &str = "p";
pub const UNIT_PPM: &str = "ppm";
pub const UNIT_PSI: &str = "psi";
pub const UNIT_RATIO: &str = "r";
pub const UNIT_RPM: &str = "rpm";
pub const UNIT_SECOND: &str = "sec";
pub const UNIT_VOLTS: &str = "v";
pub const UNIT_WATT: &str = "w";
