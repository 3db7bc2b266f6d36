//! Recoding helpers shared by the derivation themes.
//!
//! Every helper maps missing inputs to missing outputs of equal or stronger
//! rank; only valid inputs produce valid outputs.

use sdd_model::{BinaryConvention, MissingCode, Response};

/// Collapses a coded response by a fixed partition.
///
/// A valid code outside every group is treated as item missing.
pub fn partition(response: Response, groups: &[(&[i64], f64)]) -> Response {
    match response {
        Response::Missing(_) => response,
        Response::Value(_) => response
            .code()
            .and_then(|code| {
                groups
                    .iter()
                    .find(|(codes, _)| codes.contains(&code))
                    .map(|(_, value)| Response::Value(*value))
            })
            .unwrap_or(Response::NO_ANSWER),
    }
}

/// Recodes a raw 1 = yes / 2 = no question into the given convention.
pub fn yes_no(response: Response, convention: BinaryConvention) -> Response {
    partition(
        response,
        &[(&[1], convention.yes()), (&[2], convention.no())],
    )
}

/// Bands a value by ascending upper edges.
///
/// A value below `edges[i]` (and not below an earlier edge) gets band
/// `i + 1`; values at or above the last edge get `edges.len() + 1`.
pub fn band(response: Response, edges: &[f64]) -> Response {
    match response {
        Response::Missing(_) => response,
        Response::Value(value) => {
            let index = edges.iter().position(|edge| value < *edge).unwrap_or(edges.len());
            Response::Value((index + 1) as f64)
        }
    }
}

/// Bands an integer score by inclusive ranges; values outside every range
/// are item missing.
pub fn band_inclusive(response: Response, ranges: &[(f64, f64, f64)]) -> Response {
    match response {
        Response::Missing(_) => response,
        Response::Value(value) => ranges
            .iter()
            .find(|(low, high, _)| value >= *low && value <= *high)
            .map_or(Response::NO_ANSWER, |(_, _, code)| Response::Value(*code)),
    }
}

/// Promotes prefer-not-to-say to item missing.
pub fn promote_refusal(response: Response) -> Response {
    if response.missing() == Some(MissingCode::PreferNotToSay) {
        Response::NO_ANSWER
    } else {
        response
    }
}

/// Composite "any" over a set of members.
///
/// Yes when any member satisfies `is_yes`; otherwise the strongest unknown
/// code among the members; otherwise no. Valid non-yes answers and
/// not-applicable routing both count as no.
pub fn any_of<F>(members: &[Response], is_yes: F, convention: BinaryConvention) -> Response
where
    F: Fn(Response) -> bool,
{
    if members.iter().any(|member| is_yes(*member)) {
        return Response::Value(convention.yes());
    }
    match Response::strongest_unknown(members.iter().copied()) {
        Some(code) => Response::Missing(code),
        None => Response::Value(convention.no()),
    }
}

/// Number of members satisfying `is_yes`.
///
/// Any unknown member makes the count unknown.
pub fn count_of<F>(members: &[Response], is_yes: F) -> Response
where
    F: Fn(Response) -> bool,
{
    if let Some(code) = Response::strongest_unknown(members.iter().copied()) {
        return Response::Missing(code);
    }
    Response::Value(members.iter().filter(|member| is_yes(**member)).count() as f64)
}

/// The strongest missing code among the inputs, defaulting to item missing.
pub fn strongest(members: &[Response]) -> Response {
    Response::strongest_missing(members.iter().copied())
        .map_or(Response::NO_ANSWER, Response::Missing)
}

/// Last value that is not not-applicable, scanning in order.
pub fn last_applicable(members: &[Response]) -> Response {
    members
        .iter()
        .rev()
        .find(|member| **member != Response::NOT_APPLICABLE)
        .copied()
        .unwrap_or(Response::NOT_APPLICABLE)
}
