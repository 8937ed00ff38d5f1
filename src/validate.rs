use thiserror::Error;
use toml::Value;

use crate::config::RawTarget;
use crate::types::Target;

const MIN_PORT: i64 = 1;
const MAX_PORT: i64 = 65535;

/// Why a target was skipped or degraded during validation.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    #[error("`ip` value is empty or null")]
    EmptyAddress,
    #[error("`ip` must be a string")]
    AddressType,
    #[error("port(s) must be in the range (1, 65535)")]
    PortOutOfRange,
    #[error("port(s) must be an integer or a list of integers")]
    PortType,
    #[error("`scan` value must be a boolean")]
    ScanType,
}

/// Outcome of validating one declared target.
#[derive(Debug, Clone, PartialEq)]
pub enum Validation {
    /// Probed as declared.
    Ready(Target),
    /// Kept for liveness probing, but scanning forced off.
    Degraded {
        target: Target,
        reason: ValidationError,
    },
    /// Dropped from the round entirely, never probed.
    Skipped {
        name: String,
        reason: ValidationError,
    },
}

/// Check one raw target. Exactly one signal per target; an address error
/// outranks a port error, a port error outranks a scan error.
pub fn validate_target(raw: &RawTarget) -> Validation {
    let address = match check_address(raw.ip.as_ref()) {
        Ok(address) => address,
        Err(reason) => {
            return Validation::Skipped {
                name: raw.name.clone(),
                reason,
            }
        }
    };

    match (check_ports(raw.ports.as_ref()), check_scan(raw.scan.as_ref())) {
        (Ok(ports), Ok(scan)) => Validation::Ready(Target {
            name: raw.name.clone(),
            address,
            ports,
            scan,
        }),
        (Err(reason), _) | (Ok(_), Err(reason)) => Validation::Degraded {
            target: Target {
                name: raw.name.clone(),
                address,
                ports: Vec::new(),
                scan: false,
            },
            reason,
        },
    }
}

fn check_address(value: Option<&Value>) -> Result<String, ValidationError> {
    match value {
        Some(Value::String(s)) if !s.is_empty() => Ok(s.clone()),
        Some(Value::String(_)) | None => Err(ValidationError::EmptyAddress),
        Some(_) => Err(ValidationError::AddressType),
    }
}

/// Absent ports mean no scan candidates; a bare integer is promoted to a
/// one-element list; lists are deduplicated and sorted ascending.
fn check_ports(value: Option<&Value>) -> Result<Vec<u16>, ValidationError> {
    let mut ports: Vec<i64> = match value {
        None => return Ok(Vec::new()),
        Some(Value::Integer(port)) => vec![*port],
        Some(Value::Array(values)) => {
            let mut list = Vec::with_capacity(values.len());
            for entry in values {
                match entry {
                    Value::Integer(port) => list.push(*port),
                    _ => return Err(ValidationError::PortType),
                }
            }
            list
        }
        Some(_) => return Err(ValidationError::PortType),
    };

    if ports.iter().any(|p| *p < MIN_PORT || *p > MAX_PORT) {
        return Err(ValidationError::PortOutOfRange);
    }
    ports.sort_unstable();
    ports.dedup();
    Ok(ports.into_iter().map(|p| p as u16).collect())
}

/// A missing flag counts as non-boolean, same as any other wrong type.
fn check_scan(value: Option<&Value>) -> Result<bool, ValidationError> {
    match value {
        Some(Value::Boolean(b)) => Ok(*b),
        _ => Err(ValidationError::ScanType),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(ip: Option<Value>, ports: Option<Value>, scan: Option<Value>) -> RawTarget {
        RawTarget {
            name: "box".into(),
            ip,
            ports,
            scan,
        }
    }

    fn int_list(ports: &[i64]) -> Value {
        Value::Array(ports.iter().map(|p| Value::Integer(*p)).collect())
    }

    #[test]
    fn duplicate_ports_dedup_and_sort() {
        let validated = validate_target(&raw(
            Some(Value::String("10.0.0.1".into())),
            Some(int_list(&[443, 22, 22])),
            Some(Value::Boolean(true)),
        ));
        match validated {
            Validation::Ready(target) => {
                assert_eq!(target.ports, vec![22, 443]);
                assert!(target.scan);
            }
            other => panic!("expected Ready, got {other:?}"),
        }
    }

    #[test]
    fn single_port_promotes_to_a_list() {
        let validated = validate_target(&raw(
            Some(Value::String("10.0.0.1".into())),
            Some(Value::Integer(8080)),
            Some(Value::Boolean(true)),
        ));
        match validated {
            Validation::Ready(target) => assert_eq!(target.ports, vec![8080]),
            other => panic!("expected Ready, got {other:?}"),
        }
    }

    #[test]
    fn out_of_range_port_degrades() {
        let validated = validate_target(&raw(
            Some(Value::String("10.0.0.1".into())),
            Some(int_list(&[70000])),
            Some(Value::Boolean(true)),
        ));
        match validated {
            Validation::Degraded { target, reason } => {
                assert_eq!(reason, ValidationError::PortOutOfRange);
                assert!(target.ports.is_empty());
                assert!(!target.scan);
                assert_eq!(target.address, "10.0.0.1");
            }
            other => panic!("expected Degraded, got {other:?}"),
        }
    }

    #[test]
    fn non_integer_port_degrades() {
        let validated = validate_target(&raw(
            Some(Value::String("10.0.0.1".into())),
            Some(Value::Array(vec![Value::String("ssh".into())])),
            Some(Value::Boolean(true)),
        ));
        assert!(matches!(
            validated,
            Validation::Degraded {
                reason: ValidationError::PortType,
                ..
            }
        ));
    }

    #[test]
    fn non_boolean_scan_degrades() {
        let validated = validate_target(&raw(
            Some(Value::String("10.0.0.1".into())),
            Some(int_list(&[22])),
            Some(Value::String("yes".into())),
        ));
        assert!(matches!(
            validated,
            Validation::Degraded {
                reason: ValidationError::ScanType,
                ..
            }
        ));
    }

    #[test]
    fn missing_scan_flag_degrades() {
        let validated = validate_target(&raw(Some(Value::String("10.0.0.1".into())), None, None));
        assert!(matches!(
            validated,
            Validation::Degraded {
                reason: ValidationError::ScanType,
                ..
            }
        ));
    }

    #[test]
    fn empty_address_skips_the_target() {
        let validated = validate_target(&raw(
            Some(Value::String(String::new())),
            Some(int_list(&[22])),
            Some(Value::Boolean(true)),
        ));
        assert!(matches!(
            validated,
            Validation::Skipped {
                reason: ValidationError::EmptyAddress,
                ..
            }
        ));
    }

    #[test]
    fn non_string_address_skips_the_target() {
        let validated = validate_target(&raw(Some(Value::Integer(42)), None, None));
        assert!(matches!(
            validated,
            Validation::Skipped {
                reason: ValidationError::AddressType,
                ..
            }
        ));
    }

    #[test]
    fn address_errors_outrank_port_errors() {
        let validated = validate_target(&raw(None, Some(int_list(&[70000])), None));
        assert!(matches!(validated, Validation::Skipped { .. }));
    }

    #[test]
    fn port_errors_outrank_scan_errors() {
        let validated = validate_target(&raw(
            Some(Value::String("10.0.0.1".into())),
            Some(int_list(&[70000])),
            Some(Value::String("yes".into())),
        ));
        assert!(matches!(
            validated,
            Validation::Degraded {
                reason: ValidationError::PortOutOfRange,
                ..
            }
        ));
    }
}
