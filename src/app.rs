use std::io::{self, Write};

use rom_collector::application::PipelineEvent;

use crate::ui::StatusView;

/// Renders pipeline events to a terminal-like writer.
pub struct TerminalApp<W: Write> {
    view: StatusView,
    out: W,
    // A progress line is on screen without its trailing newline.
    line_open: bool,
}

impl TerminalApp<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> TerminalApp<W> {
    pub fn new(out: W) -> Self {
        Self {
            view: StatusView::default(),
            out,
            line_open: false,
        }
    }

    #[cfg(test)]
    fn into_inner(self) -> W {
        self.out
    }

    fn close_line(&mut self) -> io::Result<()> {
        if self.line_open {
            writeln!(self.out)?;
            self.line_open = false;
        }
        Ok(())
    }

    fn print(&mut self, message: &str) -> io::Result<()> {
        self.close_line()?;
        writeln!(self.out, "{message}")
    }
}

pub fn update<W: Write>(app: &mut TerminalApp<W>, event: PipelineEvent) -> io::Result<()> {
    match event {
        PipelineEvent::Log(message) => {
            app.print(&message)?;
        }
        PipelineEvent::Percent(percent) => {
            app.view.overall_percent = percent;
        }
        PipelineEvent::DownloadTick(progress) => {
            let finished = progress.total_bytes > 0 && progress.bytes_downloaded >= progress.total_bytes;
            app.view.download = Some(progress);
            if let Some(line) = app.view.progress_line() {
                write!(app.out, "\r{line}")?;
                app.line_open = true;
            }
            if finished {
                app.close_line()?;
                app.view.download = None;
            }
        }
        PipelineEvent::Finished { message, .. } => {
            app.view.download = None;
            app.print(&message)?;
        }
        PipelineEvent::Failed(cause) => {
            app.view.download = None;
            app.print(&format!("Error: {cause}"))?;
        }
    }
    app.out.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rom_collector::domain::DownloadProgress;

    fn render(events: Vec<PipelineEvent>) -> String {
        let mut app = TerminalApp::new(Vec::new());
        for event in events {
            update(&mut app, event).unwrap();
        }
        String::from_utf8(app.into_inner()).unwrap()
    }

    fn tick(bytes_downloaded: u64, total_bytes: u64) -> PipelineEvent {
        PipelineEvent::DownloadTick(DownloadProgress {
            filename: "Kirby.gb".to_string(),
            bytes_downloaded,
            total_bytes,
        })
    }

    #[test]
    fn test_progress_is_rewritten_in_place() {
        let out = render(vec![
            PipelineEvent::Log("Starting download: Kirby.gb".to_string()),
            PipelineEvent::Percent(70),
            tick(0, 2048),
            tick(2048, 2048),
            PipelineEvent::Finished {
                downloaded: 1,
                message: "Process completed! Downloaded 1 ROMs".to_string(),
            },
        ]);

        assert_eq!(
            out,
            "Starting download: Kirby.gb\n\
             \r[ 70%] Kirby.gb: 0 B / 2.0 KB (0.0%)\
             \r[ 70%] Kirby.gb: 2.0 KB / 2.0 KB (100.0%)\n\
             Process completed! Downloaded 1 ROMs\n"
        );
    }

    #[test]
    fn test_log_after_partial_download_starts_new_line() {
        let out = render(vec![tick(1024, 0), PipelineEvent::Failed("Cancelled".to_string())]);
        assert_eq!(out, "\r[  0%] Kirby.gb: 1.0 KB (size unknown)\nError: Cancelled\n");
    }
}
