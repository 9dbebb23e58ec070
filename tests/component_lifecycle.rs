use ecs_world::{ComponentTypeId, Schema, Value, World, WorldError, WorldConfig};
use std::collections::BTreeMap;
use std::sync::Arc;

struct Flag;
impl Schema for Flag {
    fn type_id(&self) -> ComponentTypeId {
        ComponentTypeId(1)
    }
    fn name(&self) -> &str {
        "Flag"
    }
    fn construct(&self) -> Value {
        Value::Struct(BTreeMap::new())
    }
}

fn world_with_flag() -> (World<()>, Arc<dyn Schema>) {
    let mut world: World<()> = World::new(WorldConfig::default());
    let schema: Arc<dyn Schema> = Arc::new(Flag);
    world.register_schema(Arc::clone(&schema)).unwrap();
    (world, schema)
}

#[test]
fn attach_immediate_bypasses_the_queue() {
    let (mut world, schema) = world_with_flag();
    let e = world.create(vec![]);
    world.attach_immediate(e, vec![(schema.type_id(), schema.construct())]);
    assert!(world.has(e, &schema));
}

#[test]
fn detach_immediate_errors_when_the_component_is_absent() {
    let (mut world, schema) = world_with_flag();
    let e = world.create(vec![]);
    let err = world.detach_immediate(e, &[schema.type_id()]).unwrap_err();
    assert_eq!(
        err,
        WorldError::NotFound {
            entity: e,
            type_id: schema.type_id()
        }
    );
}

#[test]
fn detach_immediate_removes_a_present_component() {
    let (mut world, schema) = world_with_flag();
    let e = world.create(vec![]);
    world.attach_immediate(e, vec![(schema.type_id(), schema.construct())]);
    world.detach_immediate(e, &[schema.type_id()]).unwrap();
    assert!(!world.has(e, &schema));
}

#[test]
fn destroy_immediate_removes_every_component_of_an_entity() {
    let (mut world, schema) = world_with_flag();
    let e = world.create(vec![]);
    world.attach_immediate(e, vec![(schema.type_id(), schema.construct())]);
    world.destroy_immediate(e);
    assert!(!world.has(e, &schema));
}

#[test]
fn get_errors_not_found_for_an_absent_component() {
    let (mut world, schema) = world_with_flag();
    let e = world.create(vec![]);
    let err = world.get(e, &schema).unwrap_err();
    assert_eq!(
        err,
        WorldError::NotFound {
            entity: e,
            type_id: schema.type_id()
        }
    );
}

#[test]
fn try_get_returns_none_then_some_once_attached() {
    let (mut world, schema) = world_with_flag();
    let e = world.create(vec![]);
    assert!(world.try_get(e, &schema).is_none());
    world.attach_immediate(e, vec![(schema.type_id(), schema.construct())]);
    assert!(world.try_get(e, &schema).is_some());
}

#[test]
fn detach_flags_the_component_but_it_stays_visible_for_the_rest_of_the_step() {
    let (mut world, schema) = world_with_flag();
    let e = world.create(vec![(schema.type_id(), schema.construct())]);
    world.step(());
    assert!(world.has(e, &schema));

    let type_id = schema.type_id();
    world.detach(e, vec![type_id]);
    // The Detach op is queued, not yet applied.
    assert!(world.has(e, &schema));

    world.step(());
    assert!(!world.has(e, &schema));
}

#[test]
fn destroy_leaves_the_entity_visible_for_the_rest_of_the_step_it_was_issued_in() {
    let (mut world, schema) = world_with_flag();
    let e = world.create(vec![(schema.type_id(), schema.construct())]);
    world.step(());
    assert!(world.has(e, &schema));

    world.destroy(e);
    assert!(world.has(e, &schema));

    world.step(());
    assert!(!world.has(e, &schema));
}

#[test]
fn repeated_destroy_calls_before_the_op_applies_are_harmless() {
    let (mut world, schema) = world_with_flag();
    let e = world.create(vec![(schema.type_id(), schema.construct())]);
    world.step(());

    world.destroy(e);
    world.destroy(e);
    world.destroy(e);

    world.step(());
    assert!(!world.has(e, &schema));
}

#[test]
fn attach_then_destroy_in_the_same_pre_step_window_still_destroys_cleanly() {
    let (mut world, schema) = world_with_flag();
    let e = world.create(vec![(schema.type_id(), schema.construct())]);
    world.destroy(e);

    world.step(());
    assert!(!world.has(e, &schema));
}
