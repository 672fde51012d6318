//! Conversion through a headless LibreOffice process.
//!
//! The executable is discovered once by running each candidate with
//! `--version`; the first one that answers is cached for the lifetime of the
//! converter. Every conversion uses its own throwaway user profile so
//! concurrent LibreOffice instances do not fight over the profile lock.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tokio::sync::OnceCell;
use url::Url;

use super::{verify_output, AttemptOutcome, BackendId, Capability, ConversionBackend, ConversionJob};
use crate::config::{ExternalConfig, DEFAULT_EXECUTABLES};

pub struct ExternalProcessConverter {
    enabled: bool,
    executables: Vec<PathBuf>,
    probe_timeout: Duration,
    convert_timeout: Duration,
    resolved: OnceCell<Option<PathBuf>>,
}

impl ExternalProcessConverter {
    pub fn new(executables: Vec<PathBuf>) -> Self {
        Self {
            enabled: true,
            executables,
            probe_timeout: Duration::from_secs(10),
            convert_timeout: Duration::from_secs(30),
            resolved: OnceCell::new(),
        }
    }

    pub fn from_config(config: &ExternalConfig) -> Self {
        Self {
            enabled: config.enabled,
            executables: config.executables.clone(),
            probe_timeout: config.probe_timeout(),
            convert_timeout: config.convert_timeout(),
            resolved: OnceCell::new(),
        }
    }

    pub fn with_timeouts(mut self, probe: Duration, convert: Duration) -> Self {
        self.probe_timeout = probe;
        self.convert_timeout = convert;
        self
    }

    /// The executable in use, probing on first call.
    pub async fn executable(&self) -> Option<&Path> {
        if !self.enabled {
            return None;
        }
        self.resolved
            .get_or_init(|| async {
                for exe in &self.executables {
                    if launches(exe, self.probe_timeout).await {
                        log::info!("external: using {}", exe.display());
                        return Some(exe.clone());
                    }
                    log::debug!("external: {} not usable", exe.display());
                }
                None
            })
            .await
            .as_deref()
    }

    async fn convert(&self, exe: &Path, job: &ConversionJob) -> AttemptOutcome {
        let out_dir = match job.input.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let out_dir = tokio::fs::canonicalize(&out_dir).await.unwrap_or(out_dir);
        let Some(stem) = job.input.file_stem().map(|s| s.to_string_lossy().into_owned()) else {
            return AttemptOutcome::Failed(format!("bad input path {}", job.input.display()));
        };
        let profile = out_dir.join(format!(".{stem}.profile"));
        let profile_url = match profile_url(&profile) {
            Ok(u) => u,
            Err(e) => return AttemptOutcome::Failed(e),
        };

        let mut command = Command::new(exe);
        command
            .arg("--headless")
            .arg("--norestore")
            .arg(format!("-env:UserInstallation={profile_url}"))
            .arg("--convert-to")
            .arg("pdf")
            .arg("--outdir")
            .arg(&out_dir)
            .arg(&job.input)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        // soffice re-executes itself as soffice.bin; its own group lets a
        // timeout reach both.
        #[cfg(unix)]
        command.process_group(0);
        let child = match command.spawn() {
            Ok(c) => c,
            Err(e) => {
                return AttemptOutcome::Failed(format!("could not launch {}: {e}", exe.display()))
            }
        };

        let pid = child.id();
        // Dropping the timed-out future drops the child, which kills it.
        let result = tokio::time::timeout(self.convert_timeout, child.wait_with_output()).await;
        if result.is_err() {
            if let Some(pid) = pid {
                kill_group(pid).await;
            }
        }
        remove_profile(&profile).await;

        let output = match result {
            Err(_) => {
                return AttemptOutcome::Failed(format!(
                    "timed out after {:?}",
                    self.convert_timeout
                ))
            }
            Ok(Err(e)) => return AttemptOutcome::Failed(format!("waiting for converter: {e}")),
            Ok(Ok(output)) => output,
        };
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return AttemptOutcome::Failed(format!(
                "converter exited with {}: {}",
                output.status,
                stderr.trim()
            ));
        }

        let produced = out_dir.join(format!("{stem}.pdf"));
        if tokio::fs::metadata(&produced).await.is_err() {
            return AttemptOutcome::Failed(format!(
                "converter reported success but wrote no {}",
                produced.display()
            ));
        }
        if produced != job.output {
            if let Err(e) = tokio::fs::rename(&produced, &job.output).await {
                return AttemptOutcome::Failed(format!(
                    "moving {} to {}: {e}",
                    produced.display(),
                    job.output.display()
                ));
            }
        }
        verify_output(job).await
    }
}

impl Default for ExternalProcessConverter {
    fn default() -> Self {
        Self::new(DEFAULT_EXECUTABLES.iter().map(PathBuf::from).collect())
    }
}

async fn launches(exe: &Path, limit: Duration) -> bool {
    let status = Command::new(exe)
        .arg("--version")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .status();
    matches!(tokio::time::timeout(limit, status).await, Ok(Ok(s)) if s.success())
}

/// `file://` URL for a profile directory, percent-encoded.
fn profile_url(profile: &Path) -> Result<String, String> {
    let absolute = std::path::absolute(profile)
        .map_err(|e| format!("resolving {}: {e}", profile.display()))?;
    Url::from_file_path(&absolute)
        .map(String::from)
        .map_err(|()| format!("{} is not expressible as a file URL", absolute.display()))
}

/// Kill whatever is left of the converter's process group.
#[cfg(unix)]
async fn kill_group(pgid: u32) {
    let status = Command::new("kill")
        .arg("-KILL")
        .arg("--")
        .arg(format!("-{pgid}"))
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await;
    match status {
        Ok(s) if s.success() => log::debug!("external: killed process group {pgid}"),
        Ok(_) => log::debug!("external: process group {pgid} already gone"),
        Err(e) => log::warn!("external: could not signal process group {pgid}: {e}"),
    }
}

#[cfg(not(unix))]
async fn kill_group(_pgid: u32) {}

async fn remove_profile(profile: &Path) {
    match tokio::fs::remove_dir_all(profile).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => log::warn!("could not remove profile {}: {e}", profile.display()),
    }
}

#[async_trait]
impl ConversionBackend for ExternalProcessConverter {
    fn id(&self) -> BackendId {
        BackendId::External
    }

    async fn probe(&self) -> Capability {
        if !self.enabled {
            return Capability::Unavailable("disabled in configuration".into());
        }
        match self.executable().await {
            Some(_) => Capability::Ready,
            None => Capability::Unavailable(format!(
                "no LibreOffice executable found among {} candidate(s)",
                self.executables.len()
            )),
        }
    }

    async fn attempt(&self, job: &ConversionJob) -> AttemptOutcome {
        if let Capability::Unavailable(reason) = self.probe().await {
            return AttemptOutcome::Unavailable(reason);
        }
        match self.executable().await {
            Some(exe) => self.convert(exe, job).await,
            None => AttemptOutcome::Unavailable("no LibreOffice executable".into()),
        }
    }

    async fn describe(&self) -> Option<String> {
        self.executable().await.map(|p| p.display().to_string())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::fs;
    use std::os::unix::fs::PermissionsExt;

    use tempfile::TempDir;

    use super::*;
    use crate::record::{CertificateRequest, Gender, RenderContext};

    fn make_executable(path: &Path) {
        let mut perms = fs::metadata(path).unwrap().permissions();
        perms.set_mode(0o755);
        fs::set_permissions(path, perms).unwrap();
    }

    fn fake_soffice(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("fake-soffice");
        let script = format!(
            "#!/bin/sh\nif [ \"$1\" = \"--version\" ]; then echo 'LibreOffice 7.6'; exit 0; fi\n{body}\n"
        );
        fs::write(&path, script).unwrap();
        make_executable(&path);
        path
    }

    fn job(dir: &Path) -> ConversionJob {
        let input = dir.join("temp_certificate_x.html");
        fs::write(&input, "<p>hi</p>").unwrap();
        let req = CertificateRequest::new("A", "B", "C", "D", Gender::Male);
        ConversionJob {
            input,
            output: dir.join("certificate_x.pdf"),
            context: RenderContext::new(&req),
        }
    }

    /// Writes `<outdir>/<input stem>.pdf`, like LibreOffice does.
    const CONVERTS: &str = r#"
for a in "$@"; do
  if [ "$prev" = "--outdir" ]; then outdir="$a"; fi
  prev="$a"; input="$a"
done
base=$(basename "$input" .html)
printf '%%PDF-1.4 fake' > "$outdir/$base.pdf"
"#;

    #[tokio::test]
    async fn no_candidates_is_unavailable() {
        let dir = TempDir::new().unwrap();
        let conv = ExternalProcessConverter::new(vec![dir.path().join("missing")]);
        assert!(!conv.probe().await.is_ready());
        assert!(matches!(conv.attempt(&job(dir.path())).await, AttemptOutcome::Unavailable(_)));
    }

    #[tokio::test]
    async fn first_launching_candidate_wins() {
        let dir = TempDir::new().unwrap();
        let exe = fake_soffice(dir.path(), "exit 0");
        let conv = ExternalProcessConverter::new(vec![dir.path().join("missing"), exe.clone()]);
        assert_eq!(conv.executable().await, Some(exe.as_path()));
    }

    #[tokio::test]
    async fn converted_artifact_is_moved_to_output() {
        let dir = TempDir::new().unwrap();
        let exe = fake_soffice(dir.path(), CONVERTS);
        let conv = ExternalProcessConverter::new(vec![exe]);
        let job = job(dir.path());
        assert_eq!(conv.attempt(&job).await, AttemptOutcome::Success);
        assert!(job.output.exists());
        assert!(!dir.path().join("temp_certificate_x.pdf").exists());
    }

    #[tokio::test]
    async fn success_without_artifact_fails() {
        let dir = TempDir::new().unwrap();
        let exe = fake_soffice(dir.path(), "exit 0");
        let conv = ExternalProcessConverter::new(vec![exe]);
        let outcome = conv.attempt(&job(dir.path())).await;
        assert!(matches!(outcome, AttemptOutcome::Failed(ref r) if r.contains("wrote no")));
    }

    #[tokio::test]
    async fn nonzero_exit_fails() {
        let dir = TempDir::new().unwrap();
        let exe = fake_soffice(dir.path(), "echo boom >&2; exit 3");
        let conv = ExternalProcessConverter::new(vec![exe]);
        let outcome = conv.attempt(&job(dir.path())).await;
        assert!(matches!(outcome, AttemptOutcome::Failed(ref r) if r.contains("boom")));
    }

    #[tokio::test]
    async fn slow_converter_times_out() {
        let dir = TempDir::new().unwrap();
        let exe = fake_soffice(dir.path(), "sleep 5");
        let conv = ExternalProcessConverter::new(vec![exe])
            .with_timeouts(Duration::from_secs(5), Duration::from_millis(200));
        let outcome = conv.attempt(&job(dir.path())).await;
        assert!(matches!(outcome, AttemptOutcome::Failed(ref r) if r.contains("timed out")));
    }

    #[test]
    fn profile_url_is_percent_encoded() {
        let url = profile_url(Path::new("/srv/cert work/.temp_certificate_x.profile")).unwrap();
        assert_eq!(url, "file:///srv/cert%20work/.temp_certificate_x.profile");
    }

    #[tokio::test]
    async fn work_dir_with_spaces_yields_a_valid_profile_url() {
        let dir = TempDir::new().unwrap();
        let exe = fake_soffice(
            dir.path(),
            r#"for a in "$@"; do
  case "$a" in -env:UserInstallation=*) echo "$a" > "$(dirname "$0")/profile-arg";; esac
done"#,
        );
        let work = dir.path().join("cert work");
        fs::create_dir(&work).unwrap();
        let mut job = job(dir.path());
        let input = work.join("temp_certificate_x.html");
        fs::rename(&job.input, &input).unwrap();
        job.input = input;
        job.output = work.join("certificate_x.pdf");

        let conv = ExternalProcessConverter::new(vec![exe]);
        conv.attempt(&job).await;
        let arg = fs::read_to_string(dir.path().join("profile-arg")).unwrap();
        let arg = arg.trim();
        assert!(arg.starts_with("-env:UserInstallation=file:///"), "{arg}");
        assert!(arg.contains("cert%20work/.temp_certificate_x.profile"), "{arg}");
        assert!(!arg.contains(' '), "{arg}");
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn timeout_kills_the_whole_process_group() {
        let dir = TempDir::new().unwrap();
        let pid_file = dir.path().join("helper.pid");
        let exe = fake_soffice(
            dir.path(),
            &format!("sleep 30 &\necho $! > '{}'\nwait", pid_file.display()),
        );
        let conv = ExternalProcessConverter::new(vec![exe])
            .with_timeouts(Duration::from_secs(5), Duration::from_millis(300));
        let outcome = conv.attempt(&job(dir.path())).await;
        assert!(matches!(outcome, AttemptOutcome::Failed(ref r) if r.contains("timed out")));

        let pid = fs::read_to_string(&pid_file).unwrap().trim().to_string();
        let stat = PathBuf::from(format!("/proc/{pid}/stat"));
        let mut gone = false;
        for _ in 0..40 {
            // Gone, or a zombie waiting to be reaped.
            gone = match fs::read_to_string(&stat) {
                Err(_) => true,
                Ok(s) => s.rsplit(')').next().is_some_and(|rest| rest.trim_start().starts_with('Z')),
            };
            if gone {
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        assert!(gone, "background helper {pid} outlived the timeout");
    }
}
