//! Пример озвучки файла субтитров
//!
//! Синтезирует речь для каждого субтитра через цепочку провайдеров,
//! печатает подобранную скорость и сохраняет аудио в каталог.
//!
//! ```text
//! cargo run --example speak_subtitles -- subtitles.vtt out/ [config.json]
//! ```

use std::path::PathBuf;
use anyhow::{bail, Context};
use tts_player::playback::rate::{duration_fit_rate, text_density_rate};
use tts_player::{CueTimeline, PlayerConfig, ProviderChain};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let mut args = std::env::args().skip(1);
    let (Some(subtitles), Some(output)) = (args.next(), args.next()) else {
        bail!("usage: speak_subtitles <subtitles.vtt|srt> <output-dir> [config.json]");
    };
    let config = match args.next() {
        Some(path) => PlayerConfig::load(&path).with_context(|| format!("failed to load config {}", path))?,
        None => PlayerConfig::default(),
    };

    let timeline = CueTimeline::from_file(&subtitles)
        .with_context(|| format!("failed to read subtitles {}", subtitles))?;
    let output = PathBuf::from(output);
    tokio::fs::create_dir_all(&output).await?;

    let chain = ProviderChain::from_config(&config);
    println!("Провайдеры: {:?}, субтитров: {}", chain.kinds(), timeline.len());

    for (index, cue) in timeline.cues().iter().enumerate() {
        let text_rate = text_density_rate(&cue.text, cue.duration());
        match chain.synthesize(&cue.text, &config.voice, 1.0).await {
            Ok(audio) => {
                let fitted = audio
                    .measured_duration()
                    .map(|duration| duration_fit_rate(duration, cue.duration(), 1.0));
                let path = output.join(format!("{:04}.{}", index + 1, audio.format.extension()));
                tokio::fs::write(&path, &audio.data).await?;
                println!(
                    "[{:.2} - {:.2}] {:?}: текст {:.2}x, по длительности {:?} -> {}",
                    cue.start,
                    cue.end,
                    audio.provider,
                    text_rate,
                    fitted,
                    path.display()
                );
            }
            Err(e) => println!("[{:.2} - {:.2}] пропущен: {}", cue.start, cue.end, e),
        }
    }

    Ok(())
}
