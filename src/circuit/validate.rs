//! Netlist validation.

use crate::components::params::voltage_source;
use crate::components::{DeviceType, SourceKind};
use crate::error::{Result, SimError};

use super::{Netlist, NetlistElement};

/// Validate a netlist for simulation.
///
/// Checks:
/// - The netlist has at least one element
/// - Some element is connected to ground
/// - No voltage source has both terminals on the same node
/// - Every terminal and branch row lies inside the system
pub fn validate_netlist(netlist: &Netlist) -> Result<()> {
    if netlist.elements().is_empty() {
        return Err(SimError::InvalidTopology {
            message: "Circuit has no elements".to_string(),
        });
    }

    let grounded = netlist
        .elements()
        .iter()
        .any(|e| e.nodes.x == 0 || e.nodes.y == 0);
    if !grounded {
        return Err(SimError::InvalidTopology {
            message: "No element is connected to ground (node 0)".to_string(),
        });
    }

    if let Some(shorted) = netlist
        .elements()
        .iter()
        .find(|e| e.device == DeviceType::VoltageSource && e.nodes.x == e.nodes.y)
    {
        return Err(SimError::InvalidTopology {
            message: format!("Voltage source {} is short-circuited", shorted.name),
        });
    }

    for element in netlist.elements() {
        check_terminals(element, netlist.node_count())?;
        check_branch(element, netlist.node_count(), netlist.matrix_size())?;
    }

    Ok(())
}

/// Check that the node terminals of `element`, control nodes included, are
/// below `node_count`.
pub fn check_terminals(element: &NetlistElement, node_count: usize) -> Result<()> {
    let outside = |what: &str, index: f64| SimError::InvalidTopology {
        message: format!(
            "{} of {} is node {}, but the circuit has {} nodes",
            what, element.name, index, node_count
        ),
    };

    for (what, index) in [("Terminal x", element.nodes.x), ("Terminal y", element.nodes.y)] {
        if index >= node_count {
            return Err(outside(what, index as f64));
        }
    }

    let controlled = element.device == DeviceType::VoltageSource
        && element
            .params
            .get(voltage_source::SOURCE_TYPE)
            .and_then(|&code| SourceKind::from_code(code))
            == Some(SourceKind::VoltageControlled);
    if controlled {
        for slot in [voltage_source::CONTROL_X, voltage_source::CONTROL_Y] {
            let index = element.params.get(slot).copied().unwrap_or(0.0);
            let valid = index.is_finite()
                && index >= 0.0
                && index.fract() == 0.0
                && index < node_count as f64;
            if !valid {
                return Err(outside("Control node", index));
            }
        }
    }
    Ok(())
}

/// Branch devices must own a row in `node_count..matrix_size`.
fn check_branch(element: &NetlistElement, node_count: usize, matrix_size: usize) -> Result<()> {
    let z = element.nodes.z;
    if element.device.has_branch() && (z < node_count || z >= matrix_size) {
        return Err(SimError::InvalidTopology {
            message: format!(
                "Branch row {} of {} is outside rows {}..{}",
                z, element.name, node_count, matrix_size
            ),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit::NetlistElement;
    use crate::components::{Terminals, VoltageSourceStamper};

    #[test]
    fn test_empty_netlist() {
        assert!(matches!(
            validate_netlist(&Netlist::new()),
            Err(SimError::InvalidTopology { .. })
        ));
    }

    #[test]
    fn test_floating_circuit() {
        let mut n = Netlist::new();
        let a = n.add_node("a").unwrap();
        let b = n.add_node("b").unwrap();
        n.add_element(NetlistElement::new(
            "R1",
            DeviceType::Resistor,
            Terminals::new(a, b),
            vec![1.0],
        ))
        .unwrap();
        assert!(validate_netlist(&n).is_err());
    }

    #[test]
    fn test_shorted_source() {
        let mut n = Netlist::new();
        let a = n.add_node("a").unwrap();
        n.add_element(NetlistElement::new(
            "V1",
            DeviceType::VoltageSource,
            Terminals::new(a, a),
            VoltageSourceStamper::dc_parameters(5.0),
        ))
        .unwrap();
        n.add_element(NetlistElement::new(
            "R1",
            DeviceType::Resistor,
            Terminals::new(a, 0),
            vec![1.0],
        ))
        .unwrap();
        let err = validate_netlist(&n).unwrap_err();
        assert!(err.to_string().contains("V1"));
    }

    #[test]
    fn test_valid_netlist() {
        let mut n = Netlist::new();
        let a = n.add_node("a").unwrap();
        n.add_element(NetlistElement::new(
            "V1",
            DeviceType::VoltageSource,
            Terminals::new(a, 0),
            VoltageSourceStamper::dc_parameters(5.0),
        ))
        .unwrap();
        assert!(validate_netlist(&n).is_ok());
    }

    #[test]
    fn test_out_of_range_terminal() {
        let element = NetlistElement::new(
            "R1",
            DeviceType::Resistor,
            Terminals::new(1, 7),
            vec![1.0],
        );
        match check_terminals(&element, 3) {
            Err(SimError::InvalidTopology { message }) => {
                assert!(message.contains("R1"), "{}", message)
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(check_terminals(&element, 8).is_ok());
    }

    #[test]
    fn test_control_node_out_of_range() {
        let element = NetlistElement::new(
            "E1",
            DeviceType::VoltageSource,
            Terminals::new(1, 0),
            VoltageSourceStamper::controlled_parameters(2.0, 5, 0),
        );
        assert!(check_terminals(&element, 3).is_err());

        let mut negative = element.clone();
        negative.params[voltage_source::CONTROL_X] = -1.0;
        assert!(check_terminals(&negative, 8).is_err());
        negative.params[voltage_source::CONTROL_X] = f64::NAN;
        assert!(check_terminals(&negative, 8).is_err());
    }

    #[test]
    fn test_mutated_branch_row_is_rejected() {
        let mut n = Netlist::new();
        let a = n.add_node("a").unwrap();
        n.add_element(NetlistElement::new(
            "V1",
            DeviceType::VoltageSource,
            Terminals::new(a, 0),
            VoltageSourceStamper::dc_parameters(5.0),
        ))
        .unwrap();
        n.add_element(NetlistElement::new(
            "R1",
            DeviceType::Resistor,
            Terminals::new(a, 0),
            vec![1.0],
        ))
        .unwrap();
        n.elements_mut()[0].nodes.z = 9;
        assert!(matches!(validate_netlist(&n), Err(SimError::InvalidTopology { .. })));
    }
}
