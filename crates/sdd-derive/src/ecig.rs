//! E-cigarette derivations.

use sdd_model::{ColumnKind, Response};

use crate::recode::{partition, strongest};
use crate::registry::{Derivation, DerivationRegistry, Theme, names};

pub(crate) fn register(registry: &mut DerivationRegistry) {
    registry.register(Derivation::row_wise(
        "decstat3",
        Theme::ECigarettes,
        names(&["ecstat"]),
        ColumnKind::Discrete,
        |row| partition(row[0], &[(&[4, 5], 1.0), (&[2, 3], 2.0), (&[1], 3.0)]),
    ));

    registry.register(Derivation::row_wise(
        "decevr",
        Theme::ECigarettes,
        names(&["ecstat"]),
        ColumnKind::Discrete,
        |row| partition(row[0], &[(&[2, 3, 4, 5], 1.0), (&[1], 0.0)]),
    ));

    registry.register(Derivation::row_wise(
        "decreg",
        Theme::ECigarettes,
        names(&["ecstat"]),
        ColumnKind::Discrete,
        |row| partition(row[0], &[(&[5], 1.0), (&[1, 2, 3, 4], 0.0)]),
    ));

    registry.register(Derivation::row_wise(
        "ddualuse",
        Theme::ECigarettes,
        names(&["decstat3", "dcgstg3"]),
        ColumnKind::Discrete,
        |row| dual_use(row[0], row[1]),
    ));
}

/// 1 both current, 2 e-cigarettes only, 3 cigarettes only, 4 neither.
fn dual_use(vaping: Response, smoking: Response) -> Response {
    match (vaping.code(), smoking.code()) {
        (Some(vape), Some(smoke)) => {
            let vapes = vape == 1;
            let smokes = smoke == 1 || smoke == 2;
            Response::Value(match (vapes, smokes) {
                (true, true) => 1.0,
                (true, false) => 2.0,
                (false, true) => 3.0,
                (false, false) => 4.0,
            })
        }
        _ => strongest(&[vaping, smoking]),
    }
}
