pub mod main_bus;
pub mod picture_bus;

pub use main_bus::MainBus;
pub use picture_bus::PictureBus;
