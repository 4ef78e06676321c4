//! Property tests for group maintenance.
//!
//! Random sequences of entity and component operations are applied to a pool
//! with several groups. After every step each group must hold exactly the
//! live entities its matcher accepts, as found by a full rescan.

use reagent_ecs::prelude::*;
use proptest::prelude::*;

#[derive(Debug, Default, PartialEq)]
struct Pos(i32);
impl Component for Pos {}

#[derive(Debug, Default, PartialEq)]
struct Vel(i32);
impl Component for Vel {}

#[derive(Debug, Default, PartialEq)]
struct Frozen;
impl Component for Frozen {}

/// Operations we can perform on the pool.
#[derive(Debug, Clone)]
enum PoolOp {
    Create,
    Destroy(usize),
    AddPos(usize, i32),
    AddVel(usize, i32),
    ReplacePos(usize, i32),
    RemovePos(usize),
    RemoveVel(usize),
    Freeze(usize),
    Thaw(usize),
}

fn pool_op_strategy() -> impl Strategy<Value = PoolOp> {
    prop_oneof![
        3 => Just(PoolOp::Create),
        1 => (0..64usize).prop_map(PoolOp::Destroy),
        2 => (0..64usize, any::<i32>()).prop_map(|(i, v)| PoolOp::AddPos(i, v)),
        2 => (0..64usize, any::<i32>()).prop_map(|(i, v)| PoolOp::AddVel(i, v)),
        2 => (0..64usize, any::<i32>()).prop_map(|(i, v)| PoolOp::ReplacePos(i, v)),
        1 => (0..64usize).prop_map(PoolOp::RemovePos),
        1 => (0..64usize).prop_map(PoolOp::RemoveVel),
        1 => (0..64usize).prop_map(PoolOp::Freeze),
        1 => (0..64usize).prop_map(PoolOp::Thaw),
    ]
}

struct Fixture {
    pool: Pool,
    groups: Vec<GroupId>,
}

fn setup() -> Fixture {
    let mut registry = ComponentRegistry::new();
    let pos = registry.register::<Pos>("pos").unwrap();
    let vel = registry.register::<Vel>("vel").unwrap();
    let frozen = registry.register::<Frozen>("frozen").unwrap();
    let mut pool = Pool::new(registry);

    let matchers = [
        Matcher::all_of([pos]),
        Matcher::all_of([pos, vel]),
        Matcher::all_of([pos, vel]).none_of([frozen]),
        Matcher::any_of([vel, frozen]),
        Matcher::all_of([pos]).and_any_of([vel, frozen]),
    ];
    let groups = matchers
        .iter()
        .map(|m| pool.get_group(m).unwrap())
        .collect();
    Fixture { pool, groups }
}

fn pick(alive: &[EntityId], i: usize) -> Option<EntityId> {
    if alive.is_empty() {
        None
    } else {
        Some(alive[i % alive.len()])
    }
}

fn apply(pool: &mut Pool, alive: &mut Vec<EntityId>, op: PoolOp) {
    match op {
        PoolOp::Create => alive.push(pool.create_entity()),
        PoolOp::Destroy(i) => {
            if let Some(e) = pick(alive, i) {
                pool.destroy_entity(e).unwrap();
                alive.retain(|&x| x != e);
            }
        }
        PoolOp::AddPos(i, v) => {
            if let Some(e) = pick(alive, i) {
                let had = pool.has::<Pos>(e);
                assert_eq!(pool.add(e, Pos(v)).is_err(), had);
            }
        }
        PoolOp::AddVel(i, v) => {
            if let Some(e) = pick(alive, i) {
                let had = pool.has::<Vel>(e);
                assert_eq!(pool.add(e, Vel(v)).is_err(), had);
            }
        }
        PoolOp::ReplacePos(i, v) => {
            if let Some(e) = pick(alive, i) {
                pool.replace(e, Pos(v)).unwrap();
                assert_eq!(pool.get::<Pos>(e), Some(&Pos(v)));
            }
        }
        PoolOp::RemovePos(i) => {
            if let Some(e) = pick(alive, i) {
                let had = pool.has::<Pos>(e);
                assert_eq!(pool.remove::<Pos>(e).is_ok(), had);
            }
        }
        PoolOp::RemoveVel(i) => {
            if let Some(e) = pick(alive, i) {
                let had = pool.has::<Vel>(e);
                assert_eq!(pool.remove::<Vel>(e).is_ok(), had);
            }
        }
        PoolOp::Freeze(i) => {
            if let Some(e) = pick(alive, i) {
                let _ = pool.add(e, Frozen);
            }
        }
        PoolOp::Thaw(i) => {
            if let Some(e) = pick(alive, i) {
                let _ = pool.remove::<Frozen>(e);
            }
        }
    }
}

fn rescan(pool: &Pool, matcher: &Matcher) -> Vec<EntityId> {
    let mut expected: Vec<EntityId> = pool
        .entities()
        .iter()
        .copied()
        .filter(|&e| matcher.matches(pool.entity(e).unwrap()))
        .collect();
    expected.sort_unstable();
    expected
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(2_000))]

    #[test]
    fn groups_equal_full_rescan(ops in prop::collection::vec(pool_op_strategy(), 1..80)) {
        let Fixture { mut pool, groups } = setup();
        let mut alive: Vec<EntityId> = Vec::new();

        for op in ops {
            apply(&mut pool, &mut alive, op);

            for &g in &groups {
                let group = pool.group(g).unwrap();
                let expected = rescan(&pool, group.matcher());
                prop_assert_eq!(group.entities(), expected.as_slice());
            }
            prop_assert_eq!(pool.count(), alive.len());
        }
    }

    #[test]
    fn late_group_matches_incremental_group(ops in prop::collection::vec(pool_op_strategy(), 1..60)) {
        let Fixture { mut pool, groups } = setup();
        let mut alive: Vec<EntityId> = Vec::new();
        for op in ops {
            apply(&mut pool, &mut alive, op);
        }

        let incremental: Vec<Vec<EntityId>> = groups
            .iter()
            .map(|&g| pool.group(g).unwrap().entities().to_vec())
            .collect();
        let matchers: Vec<Matcher> = groups
            .iter()
            .map(|&g| pool.group(g).unwrap().matcher().clone())
            .collect();

        pool.clear_groups().unwrap();
        for (matcher, members) in matchers.iter().zip(&incremental) {
            let rebuilt = pool.get_group(matcher).unwrap();
            prop_assert_eq!(pool.group(rebuilt).unwrap().entities(), members.as_slice());
        }
    }

    #[test]
    fn shells_are_conserved(ops in prop::collection::vec(pool_op_strategy(), 1..80)) {
        let Fixture { mut pool, .. } = setup();
        let mut alive: Vec<EntityId> = Vec::new();
        for op in ops {
            apply(&mut pool, &mut alive, op);
            prop_assert_eq!(
                pool.shell_count(),
                pool.count() + pool.reusable_entity_count() + pool.retained_entity_count()
            );
        }
    }

    #[test]
    fn matcher_normalisation_is_order_insensitive(
        mut all in prop::collection::vec(0u32..3, 0..6),
        seed in any::<u64>(),
    ) {
        let mut registry = ComponentRegistry::new();
        let ids = [
            registry.register::<Pos>("pos").unwrap(),
            registry.register::<Vel>("vel").unwrap(),
            registry.register::<Frozen>("frozen").unwrap(),
        ];
        let forward = Matcher::all_of(all.iter().map(|&i| ids[i as usize]));
        let len = all.len();
        all.rotate_left((seed as usize) % len.max(1));
        all.reverse();
        let shuffled = Matcher::all_of(all.iter().map(|&i| ids[i as usize]));
        prop_assert_eq!(forward, shuffled);
    }
}
