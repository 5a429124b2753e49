pub mod appointment;
pub mod exception_day;
pub mod schedule;
pub mod slot_occupancy;

pub use appointment::AppointmentRepository;
pub use exception_day::ExceptionDayRepository;
pub use schedule::ScheduleRepository;
pub use slot_occupancy::SlotOccupancyRepository;
