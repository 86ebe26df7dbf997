//! Actions produced by components and handled by the app loop

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Leave the application
    Quit,
    /// Periodic tick while no input arrives
    Tick,
    /// Terminal was resized
    Resize(u16, u16),
}
