use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use ucp_swarm::core::state::StateCode;
use ucp_swarm::engine::constraints::{fix_min_time_constraints, is_schedule_feasible};
use ucp_swarm::engine::operators::{
    craziness_probability, inertia_probability, update_position, BinaryMove,
};

fn random_schedule(rng: &mut impl Rng, steps: usize, gen_count: usize) -> Vec<StateCode> {
    (0..steps).map(|_| rng.gen_range(0..1 << gen_count)).collect()
}

#[test]
fn test_full_inertia_keeps_velocity_bits() {
    let mut rng = ChaCha8Rng::seed_from_u64(8);
    let pos = random_schedule(&mut rng, 10, 4);
    let pbest = random_schedule(&mut rng, 10, 4);
    let gbest = random_schedule(&mut rng, 10, 4);
    let old_vel = random_schedule(&mut rng, 10, 4);

    let mut vel = old_vel.clone();
    BinaryMove::new()
        .inertia(1.0)
        .craziness(0.0)
        .update_velocity(&pos, &mut vel, &pbest, &gbest, 4, &mut rng);

    for i in 0..10 {
        assert_eq!(vel[i] & old_vel[i], old_vel[i]);
        let allowed = old_vel[i] | (pbest[i] ^ pos[i]) | (gbest[i] ^ pos[i]);
        assert_eq!(vel[i] & !allowed, 0);
    }
}

#[test]
fn test_settled_particle_stays_put() {
    let mut rng = ChaCha8Rng::seed_from_u64(9);
    let mut pos = random_schedule(&mut rng, 6, 3);
    let before = pos.clone();
    let mut vel = vec![0; 6];

    let best = pos.clone();
    BinaryMove::new()
        .inertia(0.0)
        .craziness(0.0)
        .update_velocity(&pos, &mut vel, &best, &best, 3, &mut rng);
    update_position(&mut pos, &vel);
    assert_eq!(pos, before);
}

#[test]
fn test_scheduled_hyperparameters() {
    let first = BinaryMove::scheduled(0, 180, 0);
    assert_eq!(first.prob_inertia(), 1.0);
    assert_eq!(first.prob_craziness(), 0.005);

    let late = BinaryMove::scheduled(180, 180, 250);
    assert!((late.prob_inertia() - 0.35).abs() < 1e-12);
    assert_eq!(late.prob_craziness(), 0.5);

    // Monotone in both arguments.
    for i in 1..=100 {
        assert!(inertia_probability(i, 100) <= inertia_probability(i - 1, 100));
        assert!(craziness_probability(i) >= craziness_probability(i - 1));
    }
}

#[test]
fn test_move_then_repair_is_feasible() {
    let mut rng = ChaCha8Rng::seed_from_u64(10);
    let down = [2.5, 1.0, 0.0];
    let up = [3.0, 2.0, 0.5];

    let mut pos = random_schedule(&mut rng, 12, 3);
    fix_min_time_constraints(&mut pos, 3, &down, &up);
    let mut vel = vec![0; 12];
    let pbest = pos.clone();
    let gbest = random_schedule(&mut rng, 12, 3);

    for iter in 0..50 {
        BinaryMove::scheduled(iter, 50, iter % 7).update_velocity(&pos, &mut vel, &pbest, &gbest, 3, &mut rng);
        update_position(&mut pos, &vel);
        fix_min_time_constraints(&mut pos, 3, &down, &up);
        assert!(is_schedule_feasible(&pos, 3, &down, &up));
        assert!(pos.iter().all(|&s| s < 8));
    }
}
