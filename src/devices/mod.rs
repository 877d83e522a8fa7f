
// Currently the only supported instrument is the Rigol DS1000E/DS1000D family (USB 0x1AB1:0x0588).
// Other models speaking the same command dialect can reuse this facade.

pub mod ds1000e;
