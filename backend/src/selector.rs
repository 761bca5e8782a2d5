use crate::classifier::{ClassifyError, Requested};
use crate::inference::BackendDescriptor;

/// Outcome of backend selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub descriptor: BackendDescriptor,
    /// True when auto selection found nothing available and fell back to mock.
    pub fallback: bool,
}

/// Picks the concrete backend for a request. Pure: the same inputs always
/// produce the same output.
///
/// * `Named(n)` resolves only to an available backend called `n`.
/// * `Auto` takes the available backend with the lowest priority rank, ties
///   broken by name, or the mock fallback if none is available.
pub fn resolve(
    requested: &Requested,
    available: &[BackendDescriptor],
) -> Result<Resolution, ClassifyError> {
    match requested {
        Requested::Named(name) => available
            .iter()
            .find(|d| d.available && d.name == *name)
            .map(|d| Resolution {
                descriptor: d.clone(),
                fallback: false,
            })
            .ok_or_else(|| ClassifyError::BackendNotFound(name.clone())),
        Requested::Auto => {
            let best = available
                .iter()
                .filter(|d| d.available)
                .min_by(|a, b| a.priority.cmp(&b.priority).then_with(|| a.name.cmp(&b.name)));

            match best {
                Some(d) => {
                    log::debug!("Auto selection picked {} (priority {})", d.name, d.priority);
                    Ok(Resolution {
                        descriptor: d.clone(),
                        fallback: false,
                    })
                }
                None => {
                    log::debug!("No backend available, falling back to mock");
                    Ok(Resolution {
                        descriptor: BackendDescriptor::mock_fallback(),
                        fallback: true,
                    })
                }
            }
        }
    }
}
