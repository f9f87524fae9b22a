use rom_collector::domain::DownloadProgress;
use rom_collector::utils::format_file_size;

/// What the terminal currently shows for a run.
#[derive(Default)]
pub struct StatusView {
    pub overall_percent: u8,
    pub download: Option<DownloadProgress>,
}

impl StatusView {
    /// Single-line download status, rewritten in place on every tick.
    pub fn progress_line(&self) -> Option<String> {
        let download = self.download.as_ref()?;
        let received = format_file_size(download.bytes_downloaded);
        let line = match download.fraction() {
            Some(fraction) => format!(
                "[{:>3}%] {}: {} / {} ({:.1}%)",
                self.overall_percent,
                download.filename,
                received,
                format_file_size(download.total_bytes),
                fraction * 100.0
            ),
            None => format!(
                "[{:>3}%] {}: {} (size unknown)",
                self.overall_percent, download.filename, received
            ),
        };
        Some(line)
    }
}
