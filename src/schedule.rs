//! Per-frame pass ordering.
//!
//! A [`FramePlan`] is the ordered list of GPU passes and role swaps one frame
//! performs, expressed over abstract [`Resource`]s rather than textures. It is
//! built from the role slots at frame start, checked for read/write aliasing,
//! and then executed step by step by the pipeline.
//!
//! Frame order (decay before paint):
//!
//! 1. sensing decay, trail decay
//! 2. agent kernel, agent swap
//! 3. paint trail, paint sensing, trail swap, sensing swap
//! 4. threshold
//! 5. per blur scale: downscale, horizontal blur, vertical blur
//! 6. merge
//! 7. optional post-merge trail decay and swap
//! 8. display

use std::fmt;

use crate::double_buffer::Slot;
use crate::error::PipelineError;

/// A ping-pong pair whose roles can be swapped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pair {
    Trail,
    Sensing,
    Agents,
}

/// An abstract GPU resource a pass reads or writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    Trail(Slot),
    Sensing(Slot),
    Agents(Slot),
    Threshold,
    BlurDownscaled(u32),
    BlurIntermediate(u32),
    BlurOutput(u32),
    Merged,
    Surface,
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resource::Trail(slot) => write!(f, "trail {slot:?}"),
            Resource::Sensing(slot) => write!(f, "sensing {slot:?}"),
            Resource::Agents(slot) => write!(f, "agents {slot:?}"),
            Resource::Threshold => f.write_str("threshold target"),
            Resource::BlurDownscaled(i) => write!(f, "blur scale {i} downscaled"),
            Resource::BlurIntermediate(i) => write!(f, "blur scale {i} intermediate"),
            Resource::BlurOutput(i) => write!(f, "blur scale {i} output"),
            Resource::Merged => f.write_str("merge target"),
            Resource::Surface => f.write_str("surface"),
        }
    }
}

/// A GPU pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    SensingDecay,
    TrailDecay,
    Kernel,
    PaintTrail,
    PaintSensing,
    Threshold,
    Downscale(u32),
    BlurHorizontal(u32),
    BlurVertical(u32),
    Merge,
    PostDecay,
    Display,
}

impl Stage {
    pub fn name(self) -> &'static str {
        match self {
            Stage::SensingDecay => "sensing decay",
            Stage::TrailDecay => "trail decay",
            Stage::Kernel => "agent kernel",
            Stage::PaintTrail => "paint trail",
            Stage::PaintSensing => "paint sensing",
            Stage::Threshold => "threshold",
            Stage::Downscale(_) => "blur downscale",
            Stage::BlurHorizontal(_) => "blur horizontal",
            Stage::BlurVertical(_) => "blur vertical",
            Stage::Merge => "merge",
            Stage::PostDecay => "post decay",
            Stage::Display => "display",
        }
    }
}

/// One entry of a frame plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Pass {
        stage: Stage,
        reads: Vec<Resource>,
        writes: Resource,
    },
    Swap(Pair),
}

/// Current read slot of every pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Roles {
    pub trail: Slot,
    pub sensing: Slot,
    pub agents: Slot,
}

impl Roles {
    pub fn swap(&mut self, pair: Pair) {
        let slot = match pair {
            Pair::Trail => &mut self.trail,
            Pair::Sensing => &mut self.sensing,
            Pair::Agents => &mut self.agents,
        };
        *slot = slot.flipped();
    }
}

/// Knobs that change the shape of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlanOptions {
    pub num_blur_scales: u32,
    pub second_decay: bool,
    pub paused: bool,
}

/// Ordered passes and swaps for one frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FramePlan {
    steps: Vec<Step>,
    start: Roles,
}

impl FramePlan {
    /// Build the plan for a frame starting with `roles`.
    pub fn build(roles: Roles, options: PlanOptions) -> Self {
        let mut steps = Vec::new();
        let mut r = roles;

        if !options.paused {
            steps.push(pass(
                Stage::SensingDecay,
                [Resource::Sensing(r.sensing)],
                Resource::Sensing(r.sensing.flipped()),
            ));
            steps.push(pass(
                Stage::TrailDecay,
                [Resource::Trail(r.trail)],
                Resource::Trail(r.trail.flipped()),
            ));

            // the kernel senses last frame's painted buffer, not the decayed one
            steps.push(pass(
                Stage::Kernel,
                [Resource::Agents(r.agents), Resource::Sensing(r.sensing)],
                Resource::Agents(r.agents.flipped()),
            ));
            steps.push(Step::Swap(Pair::Agents));
            r.swap(Pair::Agents);

            steps.push(pass(
                Stage::PaintTrail,
                [Resource::Agents(r.agents)],
                Resource::Trail(r.trail.flipped()),
            ));
            steps.push(pass(
                Stage::PaintSensing,
                [Resource::Agents(r.agents)],
                Resource::Sensing(r.sensing.flipped()),
            ));
            steps.push(Step::Swap(Pair::Trail));
            steps.push(Step::Swap(Pair::Sensing));
            r.swap(Pair::Trail);
            r.swap(Pair::Sensing);

            steps.push(pass(
                Stage::Threshold,
                [Resource::Trail(r.trail)],
                Resource::Threshold,
            ));
            for i in 0..options.num_blur_scales {
                steps.push(pass(
                    Stage::Downscale(i),
                    [Resource::Threshold],
                    Resource::BlurDownscaled(i),
                ));
                steps.push(pass(
                    Stage::BlurHorizontal(i),
                    [Resource::BlurDownscaled(i)],
                    Resource::BlurIntermediate(i),
                ));
                steps.push(pass(
                    Stage::BlurVertical(i),
                    [Resource::BlurIntermediate(i)],
                    Resource::BlurOutput(i),
                ));
            }

            let mut merge_reads = vec![Resource::Trail(r.trail)];
            merge_reads.extend((0..options.num_blur_scales).map(Resource::BlurOutput));
            steps.push(Step::Pass {
                stage: Stage::Merge,
                reads: merge_reads,
                writes: Resource::Merged,
            });

            if options.second_decay {
                steps.push(pass(
                    Stage::PostDecay,
                    [Resource::Trail(r.trail)],
                    Resource::Trail(r.trail.flipped()),
                ));
                steps.push(Step::Swap(Pair::Trail));
            }
        }

        steps.push(pass(Stage::Display, [Resource::Merged], Resource::Surface));

        let plan = Self { steps, start: roles };
        debug_assert!(plan.validate().is_ok(), "frame plan aliases a resource");
        plan
    }

    /// Wrap an explicit step list.
    pub fn from_steps(start: Roles, steps: Vec<Step>) -> Self {
        Self { steps, start }
    }

    /// Check that no pass reads the resource it writes.
    pub fn validate(&self) -> Result<(), PipelineError> {
        for step in &self.steps {
            if let Step::Pass { stage, reads, writes } = step {
                if reads.contains(writes) {
                    return Err(PipelineError::PingPongViolation {
                        stage: stage.name(),
                        resource: writes.to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Roles the plan was built from.
    pub fn start_roles(&self) -> Roles {
        self.start
    }

    /// Roles after every swap in the plan.
    pub fn end_roles(&self) -> Roles {
        let mut roles = self.start;
        for step in &self.steps {
            if let Step::Swap(pair) = step {
                roles.swap(*pair);
            }
        }
        roles
    }

    /// Stages in execution order.
    pub fn stages(&self) -> impl Iterator<Item = Stage> + '_ {
        self.steps.iter().filter_map(|step| match step {
            Step::Pass { stage, .. } => Some(*stage),
            Step::Swap(_) => None,
        })
    }

    pub fn swap_count(&self, pair: Pair) -> usize {
        self.steps
            .iter()
            .filter(|step| **step == Step::Swap(pair))
            .count()
    }

    /// Whether the plan advances the simulation.
    pub fn is_simulating(&self) -> bool {
        self.stages().any(|stage| stage == Stage::Kernel)
    }
}

fn pass<const N: usize>(stage: Stage, reads: [Resource; N], writes: Resource) -> Step {
    Step::Pass {
        stage,
        reads: reads.to_vec(),
        writes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(scales: u32) -> PlanOptions {
        PlanOptions {
            num_blur_scales: scales,
            second_decay: false,
            paused: false,
        }
    }

    #[test]
    fn every_pass_has_distinct_input_and_output() {
        for scales in 1..=5 {
            for second_decay in [false, true] {
                let plan = FramePlan::build(
                    Roles::default(),
                    PlanOptions {
                        second_decay,
                        ..options(scales)
                    },
                );
                plan.validate().unwrap();
            }
        }
    }

    #[test]
    fn exactly_one_agent_swap_per_frame() {
        let plan = FramePlan::build(Roles::default(), options(1));
        assert_eq!(plan.swap_count(Pair::Agents), 1);
        assert_eq!(plan.swap_count(Pair::Trail), 1);
        assert_eq!(plan.swap_count(Pair::Sensing), 1);
    }

    #[test]
    fn decay_runs_before_paint() {
        let plan = FramePlan::build(Roles::default(), options(2));
        let stages: Vec<_> = plan.stages().collect();
        let pos = |s: Stage| stages.iter().position(|x| *x == s).unwrap();
        assert!(pos(Stage::TrailDecay) < pos(Stage::PaintTrail));
        assert!(pos(Stage::SensingDecay) < pos(Stage::PaintSensing));
        assert!(pos(Stage::Kernel) < pos(Stage::PaintTrail));
        assert!(pos(Stage::Merge) < pos(Stage::Display));
        assert_eq!(*stages.last().unwrap(), Stage::Display);
    }

    #[test]
    fn paint_writes_the_decay_output() {
        let plan = FramePlan::build(Roles::default(), options(1));
        let writes = |stage: Stage| {
            plan.steps()
                .iter()
                .find_map(|step| match step {
                    Step::Pass { stage: s, writes, .. } if *s == stage => Some(*writes),
                    _ => None,
                })
                .unwrap()
        };
        assert_eq!(writes(Stage::TrailDecay), writes(Stage::PaintTrail));
        assert_eq!(writes(Stage::SensingDecay), writes(Stage::PaintSensing));
    }

    #[test]
    fn blur_passes_scale_with_count() {
        let plan = FramePlan::build(Roles::default(), options(4));
        let blur = plan
            .stages()
            .filter(|s| {
                matches!(
                    s,
                    Stage::Downscale(_) | Stage::BlurHorizontal(_) | Stage::BlurVertical(_)
                )
            })
            .count();
        assert_eq!(blur, 12);
    }

    #[test]
    fn second_decay_adds_one_trail_swap() {
        let plan = FramePlan::build(
            Roles::default(),
            PlanOptions {
                second_decay: true,
                ..options(1)
            },
        );
        assert_eq!(plan.swap_count(Pair::Trail), 2);
        assert_eq!(plan.end_roles().trail, Slot::A);
    }

    #[test]
    fn paused_plan_only_presents() {
        let plan = FramePlan::build(
            Roles::default(),
            PlanOptions {
                paused: true,
                ..options(3)
            },
        );
        assert!(!plan.is_simulating());
        assert_eq!(plan.stages().collect::<Vec<_>>(), vec![Stage::Display]);
        assert_eq!(plan.end_roles(), plan.start_roles());
    }

    #[test]
    fn end_roles_flip_each_pair_once() {
        let start = Roles {
            trail: Slot::B,
            sensing: Slot::A,
            agents: Slot::B,
        };
        let end = FramePlan::build(start, options(1)).end_roles();
        assert_eq!(end.trail, Slot::A);
        assert_eq!(end.sensing, Slot::B);
        assert_eq!(end.agents, Slot::A);
    }

    #[test]
    fn aliasing_plan_is_rejected() {
        let plan = FramePlan::from_steps(
            Roles::default(),
            vec![Step::Pass {
                stage: Stage::TrailDecay,
                reads: vec![Resource::Trail(Slot::A)],
                writes: Resource::Trail(Slot::A),
            }],
        );
        match plan.validate() {
            Err(PipelineError::PingPongViolation { stage, .. }) => assert_eq!(stage, "trail decay"),
            other => panic!("expected violation, got {other:?}"),
        }
    }
}
