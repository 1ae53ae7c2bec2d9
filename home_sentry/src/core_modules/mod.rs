pub mod alert;
pub mod debounce;
pub mod frame;
pub mod frame_source;
pub mod motion_estimator;
