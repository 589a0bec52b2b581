//! Integration tests for attribute ordering and cycle detection.

use probrem::model::{Attribute, ColumnRef, Dependency, ErClass, ModelError, Prm, PrmBuilder};

fn school() -> PrmBuilder {
    Prm::builder("school")
        .class(ErClass::entity("Professor", vec!["prof_id"]))
        .class(ErClass::entity("Student", vec!["student_id"]))
        .class(ErClass::relationship("advisor", vec!["prof_id", "student_id"]))
        // Declared child-first so the order cannot fall out of declaration order.
        .attribute(Attribute::new("Student", "success", vec![0, 1]))
        .attribute(Attribute::new("Professor", "funding", vec![0, 1]))
        .attribute(Attribute::new("Professor", "fame", vec![0, 1]))
        .attribute(Attribute::new("Student", "intelligence", vec![0, 1, 2]))
        .dependency(
            Dependency::new("Professor.funding", "Professor.fame").slotchain(vec!["Professor"]),
        )
        .dependency(
            Dependency::new("Student.success", "Professor.fame")
                .slotchain(vec!["Student", "advisor", "Professor"])
                .join(ColumnRef::new("Student", "student_id"), ColumnRef::new("advisor", "student_id"))
                .join(ColumnRef::new("advisor", "prof_id"), ColumnRef::new("Professor", "prof_id"))
                .aggregator("AVG"),
        )
        .dependency(
            Dependency::new("Student.success", "Student.intelligence").slotchain(vec!["Student"]),
        )
}

fn position(order: &[&Attribute], name: &str) -> usize {
    order
        .iter()
        .position(|a| a.qualified_name() == name)
        .unwrap()
}

#[test]
fn test_parents_precede_children() {
    let prm = school().build().unwrap();
    let order = prm.topo_sort_attributes();

    assert_eq!(order.len(), 4);
    for dep in prm.dependencies() {
        assert!(
            position(&order, &dep.parent) < position(&order, &dep.child),
            "{} must precede {}",
            dep.parent,
            dep.child
        );
    }
}

#[test]
fn test_order_is_stable() {
    let first: Vec<String> = school()
        .build()
        .unwrap()
        .topo_sort_attributes()
        .iter()
        .map(|a| a.qualified_name())
        .collect();
    let second: Vec<String> = school()
        .build()
        .unwrap()
        .topo_sort_attributes()
        .iter()
        .map(|a| a.qualified_name())
        .collect();
    assert_eq!(first, second);
}

#[test]
fn test_parents_and_children() {
    let prm = school().build().unwrap();

    let parents: Vec<String> = prm
        .parents("Student.success")
        .unwrap()
        .iter()
        .map(|a| a.qualified_name())
        .collect();
    assert_eq!(parents.len(), 2);
    assert!(parents.contains(&"Professor.fame".to_string()));
    assert!(parents.contains(&"Student.intelligence".to_string()));

    let children: Vec<String> = prm
        .children("Professor.fame")
        .unwrap()
        .iter()
        .map(|a| a.qualified_name())
        .collect();
    assert_eq!(children.len(), 2);

    assert!(prm.children("Student.success").unwrap().is_empty());
    assert!(matches!(
        prm.parents("Student.age"),
        Err(ModelError::UnknownAttribute(_))
    ));
}

#[test]
fn test_cycle_is_rejected() {
    let err = school()
        .dependency(
            Dependency::new("Professor.fame", "Student.success")
                .slotchain(vec!["Professor", "advisor", "Student"])
                .join(ColumnRef::new("Professor", "prof_id"), ColumnRef::new("advisor", "prof_id"))
                .join(ColumnRef::new("advisor", "student_id"), ColumnRef::new("Student", "student_id"))
                .aggregator("AVG"),
        )
        .build()
        .unwrap_err();

    match err {
        ModelError::CyclicDependency(members) => {
            assert!(members.contains(&"Professor.fame".to_string()));
            assert!(members.contains(&"Student.success".to_string()));
            assert!(!members.contains(&"Student.intelligence".to_string()));
        }
        other => panic!("expected a cycle, got {other}"),
    }
}

#[test]
fn test_self_dependency_is_a_cycle() {
    let err = school()
        .dependency(
            Dependency::new("Student.intelligence", "Student.intelligence")
                .slotchain(vec!["Student"]),
        )
        .build()
        .unwrap_err();

    match err {
        ModelError::CyclicDependency(members) => {
            assert_eq!(members, vec!["Student.intelligence".to_string()]);
        }
        other => panic!("expected a cycle, got {other}"),
    }
}

#[test]
fn test_isolated_attributes_are_ordered() {
    let prm = Prm::builder("flat")
        .class(ErClass::entity("Course", vec!["course_id"]))
        .attribute(Attribute::new("Course", "difficulty", vec![0, 1]))
        .attribute(Attribute::new("Course", "rating", vec![0, 1]))
        .build()
        .unwrap();

    let names: Vec<String> = prm
        .topo_sort_attributes()
        .iter()
        .map(|a| a.qualified_name())
        .collect();
    assert_eq!(names, vec!["Course.difficulty", "Course.rating"]);
}
