use ecs_world::{ComponentState, ComponentTypeId, Schema, Value, World, WorldConfig};
use std::collections::BTreeMap;
use std::sync::Arc;

struct Marker;
impl Schema for Marker {
    fn type_id(&self) -> ComponentTypeId {
        ComponentTypeId(1)
    }
    fn name(&self) -> &str {
        "Marker"
    }
    fn construct(&self) -> Value {
        Value::Struct(BTreeMap::new())
    }
}

fn world_with_marker() -> (World<u32>, Arc<dyn Schema>) {
    let mut world: World<u32> = World::new(WorldConfig::default());
    let schema: Arc<dyn Schema> = Arc::new(Marker);
    world.register_schema(Arc::clone(&schema)).unwrap();
    (world, schema)
}

#[test]
fn spawn_then_read_next_step() {
    let (mut world, schema) = world_with_marker();
    let e = world.create(vec![(schema.type_id(), schema.construct())]);

    // Attach is deferred: nobody observes the component until the next
    // step drains and applies the queued op.
    assert!(!world.has(e, &schema));
    world.step(1);
    assert!(world.has(e, &schema));
}

#[test]
fn attach_then_detach_in_one_step() {
    let (mut world, schema) = world_with_marker();
    let e = world.create(vec![]);

    world.attach(e, vec![(schema.type_id(), schema.construct())]);
    world.step(1);
    assert!(world.has(e, &schema));

    let type_id = schema.type_id();
    world.register_system(move |w: &mut World<u32>, _data: &u32| {
        w.detach(e, vec![type_id]);
    });
    world.step(2);
    assert!(world.has(e, &schema));

    world.step(3);
    assert!(!world.has(e, &schema));
}

#[test]
fn systems_run_in_registration_order() {
    use std::cell::RefCell;
    use std::rc::Rc;

    let mut world: World<()> = World::new(WorldConfig::default());
    let log = Rc::new(RefCell::new(Vec::new()));

    let log_a = Rc::clone(&log);
    world.register_system(move |_, _| log_a.borrow_mut().push("a"));
    let log_b = Rc::clone(&log);
    world.register_system(move |_, _| log_b.borrow_mut().push("b"));

    world.step(());
    assert_eq!(&*log.borrow(), &["a", "b"]);
}

#[test]
fn ops_issued_before_first_step_take_effect_before_first_system_runs() {
    let (mut world, schema) = world_with_marker();
    let e = world.create(vec![(schema.type_id(), schema.construct())]);

    let schema_for_system = Arc::clone(&schema);
    world.register_system(move |w: &mut World<u32>, _data: &u32| {
        assert!(w.has(e, &schema_for_system));
    });

    world.step(1);
}

#[test]
fn ops_enqueued_during_a_step_are_not_applied_until_the_next_step() {
    let (mut world, schema) = world_with_marker();
    let e = world.create(vec![]);
    world.step(1);

    let type_id = schema.type_id();
    let construct = schema.construct();
    world.register_system(move |w: &mut World<u32>, _data: &u32| {
        w.attach(e, vec![(type_id, construct.clone())]);
    });

    world.step(2);
    assert!(!world.has(e, &schema));
    world.step(3);
    assert!(world.has(e, &schema));
}
