use std::fmt;

/// Dense integer identifier for a component schema, chosen at registration
/// time.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct ComponentTypeId(pub u32);

impl fmt::Display for ComponentTypeId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "ComponentTypeId({})", self.0)
    }
}

/// The component lifecycle state machine. `Attaching` and `Detaching` are
/// mutually exclusive; the sequence a single component passes through is
/// always a prefix of this order, with no regressions.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ComponentState {
    Attaching,
    Attached,
    Detaching,
    Detached,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn states_are_distinguishable() {
        assert_ne!(ComponentState::Attaching, ComponentState::Attached);
        assert_ne!(ComponentState::Detaching, ComponentState::Detached);
    }
}
