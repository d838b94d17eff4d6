use std::io;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};

use thiserror::Error;

use crate::config::Config;
use crate::session::Phase;

#[derive(Error, Debug)]
pub enum AudioError {
    #[error("audio track not found: {0}")]
    MissingTrack(PathBuf),

    #[error("failed to start player `{player}`: {source}")]
    Spawn {
        player: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to stop player: {0}")]
    Stop(#[source] io::Error),
}

/// A playable audio resource owned by the phase controller.
///
/// Calls never block on playback; they return once the command has been
/// issued so the caller can decide what to do with a failure.
pub trait Track {
    fn play(&mut self) -> Result<(), AudioError>;

    /// Stopping a track that is not playing is a no-op.
    fn stop(&mut self) -> Result<(), AudioError>;

    fn is_playing(&mut self) -> bool;

    /// Give looping tracks a chance to restart after reaching the end.
    fn poll(&mut self) -> Result<(), AudioError> {
        Ok(())
    }
}

/// Plays a file through an external player process, e.g. `paplay work.wav`.
#[derive(Debug)]
pub struct CommandTrack {
    player: String,
    player_args: Vec<String>,
    path: PathBuf,
    looping: bool,
    child: Option<Child>,
}

impl CommandTrack {
    /// Checks the file exists; nothing is spawned until `play`.
    pub fn load<P: AsRef<Path>>(
        player: &str,
        player_args: &[String],
        path: P,
    ) -> Result<Self, AudioError> {
        let path = path.as_ref().to_path_buf();
        if !path.is_file() {
            return Err(AudioError::MissingTrack(path));
        }
        Ok(Self {
            player: player.to_string(),
            player_args: player_args.to_vec(),
            path,
            looping: true,
            child: None,
        })
    }

    pub fn with_looping(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn spawn(&mut self) -> Result<(), AudioError> {
        let child = Command::new(&self.player)
            .args(&self.player_args)
            .arg(&self.path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| AudioError::Spawn {
                player: self.player.clone(),
                source,
            })?;
        self.child = Some(child);
        Ok(())
    }

    fn has_exited(&mut self) -> bool {
        match self.child.as_mut() {
            Some(child) => !matches!(child.try_wait(), Ok(None)),
            None => true,
        }
    }
}

impl Track for CommandTrack {
    fn play(&mut self) -> Result<(), AudioError> {
        if !self.has_exited() {
            return Ok(());
        }
        self.spawn()
    }

    fn stop(&mut self) -> Result<(), AudioError> {
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };
        if let Ok(None) = child.try_wait() {
            if let Err(err) = child.kill() {
                // still alive: keep the handle so a later stop or drop retries
                if let Ok(None) = child.try_wait() {
                    self.child = Some(child);
                    return Err(AudioError::Stop(err));
                }
            }
        }
        // reap so the player does not linger as a zombie
        let _ = child.wait();
        Ok(())
    }

    fn is_playing(&mut self) -> bool {
        !self.has_exited()
    }

    fn poll(&mut self) -> Result<(), AudioError> {
        if self.looping && self.child.is_some() && self.has_exited() {
            tracing::debug!(path = %self.path.display(), "restarting looping track");
            self.spawn()?;
        }
        Ok(())
    }
}

impl Drop for CommandTrack {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

/// Stand-in used with `--no-sound`; remembers what it was asked to do.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct SilentTrack {
    pub playing: bool,
    pub plays: u32,
    pub stops: u32,
}

impl Track for SilentTrack {
    fn play(&mut self) -> Result<(), AudioError> {
        self.playing = true;
        self.plays += 1;
        Ok(())
    }

    fn stop(&mut self) -> Result<(), AudioError> {
        self.playing = false;
        self.stops += 1;
        Ok(())
    }

    fn is_playing(&mut self) -> bool {
        self.playing
    }
}

/// The two tracks switched between on phase changes.
pub struct Tracks {
    pub work: Box<dyn Track>,
    pub rest: Box<dyn Track>,
}

impl Tracks {
    pub fn new(work: Box<dyn Track>, rest: Box<dyn Track>) -> Self {
        Self { work, rest }
    }

    pub fn silent() -> Self {
        Self::new(Box::<SilentTrack>::default(), Box::<SilentTrack>::default())
    }

    /// Load both tracks described by the config, or silent ones when sound is off.
    pub fn load(config: &Config) -> Result<Self, AudioError> {
        if !config.sound {
            return Ok(Self::silent());
        }
        let work = CommandTrack::load(&config.player, &config.player_args, &config.work_track)?
            .with_looping(config.loop_tracks);
        let rest = CommandTrack::load(&config.player, &config.player_args, &config.rest_track)?
            .with_looping(config.loop_tracks);
        tracing::info!(
            player = %config.player,
            work = %work.path().display(),
            rest = %rest.path().display(),
            "audio tracks loaded"
        );
        Ok(Self::new(Box::new(work), Box::new(rest)))
    }

    pub fn for_phase(&mut self, phase: Phase) -> Option<&mut Box<dyn Track>> {
        match phase {
            Phase::Working => Some(&mut self.work),
            Phase::Resting => Some(&mut self.rest),
            Phase::Idle => None,
        }
    }

    /// Stop both tracks, attempting each even if the first fails.
    pub fn stop_all(&mut self) -> Result<(), AudioError> {
        let work = self.work.stop();
        let rest = self.rest.stop();
        work.and(rest)
    }

    pub fn poll(&mut self) -> Result<(), AudioError> {
        let work = self.work.poll();
        let rest = self.rest.poll();
        work.and(rest)
    }

    pub fn any_playing(&mut self) -> bool {
        self.work.is_playing() || self.rest.is_playing()
    }
}

impl std::fmt::Debug for Tracks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tracks").finish_non_exhaustive()
    }
}
