use burn::config::Config;
use indicatif::{ProgressBar, ProgressStyle};

use crate::{
    common::utils::mean,
    env::base::Env,
    error::{ConfigurationError, Result as EnvResult},
};

#[derive(Debug, Clone, PartialEq)]
pub struct EvalResult {
    pub mean_len: f32,
    pub mean_reward: f32,
}

#[derive(Config)]
pub struct EvalConfig {
    #[config(default = 10)]
    pub n_eval_episodes: usize,
    #[config(default = false)]
    pub progress_bar: bool,
    #[config(default = false)]
    pub print_reward: bool,
}

/// Runs `cfg.n_eval_episodes` full episodes, choosing actions with `policy`.
pub fn evaluate_policy<O, A, I>(
    env: &mut dyn Env<O, A, Info = I>,
    mut policy: impl FnMut(&O) -> A,
    cfg: &EvalConfig,
) -> EnvResult<EvalResult>
where
    O: Clone,
    A: Clone,
{
    if cfg.n_eval_episodes == 0 {
        return Err(ConfigurationError::InvalidValue(
            "n_eval_episodes must be positive".to_string(),
        )
        .into());
    }

    let mut episode_rewards = Vec::with_capacity(cfg.n_eval_episodes);
    let mut episode_lengths = Vec::with_capacity(cfg.n_eval_episodes);

    let bar = if cfg.progress_bar {
        let bar = ProgressBar::new(cfg.n_eval_episodes as u64);
        if let Ok(style) = ProgressStyle::with_template("{bar:40} {pos}/{len} episodes {msg}") {
            bar.set_style(style);
        }
        bar
    } else {
        ProgressBar::hidden()
    };

    tracing::info!(episodes = cfg.n_eval_episodes, "starting evaluation");

    for _ in 0..cfg.n_eval_episodes {
        let (mut state, _) = env.reset(None, None)?;
        let mut running_reward = 0.0;
        let mut ep_len = 0.0;

        loop {
            let action = policy(&state);
            let step_sample = env.step(&action)?;

            running_reward += step_sample.reward;
            ep_len += 1.0;

            if cfg.print_reward {
                tracing::info!(reward = step_sample.reward, "eval step");
            }

            if step_sample.terminated | step_sample.truncated {
                break;
            }
            state = step_sample.obs;
        }

        episode_rewards.push(running_reward);
        episode_lengths.push(ep_len);
        bar.set_message(format!("last reward {running_reward:.3}"));
        bar.inc(1);
    }

    bar.finish_and_clear();

    Ok(EvalResult {
        mean_len: mean(&episode_lengths),
        mean_reward: mean(&episode_rewards),
    })
}
