pub mod calibration;
pub mod robust;
pub mod valuation;
