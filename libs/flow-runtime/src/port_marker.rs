//! Static port declarations a `Component` exposes before any process is
//! spawned from it.
//!
//! Grounded on `hbflow.core.component`'s `IN`/`OUT` class-level marker
//! objects (`description`, `display_name`, `array_size`), which the
//! original scans via `dir(cls)` at instantiation time. Rust has no
//! attribute reflection, so the equivalent list is produced by a method
//! instead of discovered by scanning — see `DESIGN.md` for why that method
//! ended up taking `&self` rather than being a true `Self: Sized` static.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortDirection {
    Input,
    Output,
}

#[derive(Debug, Clone)]
pub struct PortMarker {
    pub name: &'static str,
    pub direction: PortDirection,
    pub description: Option<&'static str>,
    pub display_name: Option<&'static str>,
    pub array_size: u32,
}

impl PortMarker {
    pub fn input(name: &'static str) -> Self {
        Self {
            name,
            direction: PortDirection::Input,
            description: None,
            display_name: None,
            array_size: 1,
        }
    }

    pub fn output(name: &'static str) -> Self {
        Self {
            name,
            direction: PortDirection::Output,
            description: None,
            display_name: None,
            array_size: 1,
        }
    }

    pub fn with_description(mut self, description: &'static str) -> Self {
        self.description = Some(description);
        self
    }

    pub fn with_display_name(mut self, display_name: &'static str) -> Self {
        self.display_name = Some(display_name);
        self
    }

    pub fn with_array_size(mut self, array_size: u32) -> Self {
        self.array_size = array_size;
        self
    }
}
