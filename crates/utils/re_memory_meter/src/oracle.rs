//! The process-wide source of shallow sizes.
//!
//! Installed once, typically first thing in `main`, and read-only from then on.

use std::sync::OnceLock;

use crate::{InstallError, Measurable};

/// Answers "how many bytes does this node occupy, not counting the nodes it references?".
pub trait SizeOracle: Send + Sync + 'static {
    fn shallow_size(&self, node: &dyn Measurable) -> u64;
}

/// Estimates shallow sizes from static type layout.
///
/// The shallow size of a node is its inline size ([`std::mem::size_of_val`]) plus
/// [`Measurable::heap_size_bytes`].
///
/// This is an approximation: it does not see allocator headers and rounding,
/// the reference counts stored next to `Rc`/`Arc` pointees, or capacity
/// a collection reserves beyond what it reports.
#[derive(Clone, Copy, Debug, Default)]
pub struct LayoutOracle;

impl SizeOracle for LayoutOracle {
    #[inline]
    fn shallow_size(&self, node: &dyn Measurable) -> u64 {
        std::mem::size_of_val(node) as u64 + node.heap_size_bytes()
    }
}

// ----------------------------------------------------------------------------

static ORACLE: OnceLock<Box<dyn SizeOracle>> = OnceLock::new();

/// Install the process-wide [`SizeOracle`].
///
/// Must happen before the first measurement. Fails if an oracle is already installed.
pub fn install_oracle(oracle: impl SizeOracle) -> Result<(), InstallError> {
    let mut installed = false;
    ORACLE.get_or_init(|| {
        installed = true;
        Box::new(oracle)
    });

    if installed {
        log::debug!("Installed size oracle");
        Ok(())
    } else {
        Err(InstallError::AlreadyInstalled)
    }
}

/// Install [`LayoutOracle`], unless some oracle is already installed.
///
/// Returns `true` if this call installed it.
pub fn install_layout_oracle() -> bool {
    install_oracle(LayoutOracle).is_ok()
}

pub fn is_oracle_installed() -> bool {
    ORACLE.get().is_some()
}

pub(crate) fn installed_oracle() -> Option<&'static dyn SizeOracle> {
    ORACLE.get().map(|oracle| &**oracle)
}
