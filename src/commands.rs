use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use log::info;
use serde::Serialize;

use crate::cache::{export_cover, save_cover_to_cache};
use crate::fs_scan::scan_directory_for_audio_files;
use crate::models::{CoverImage, LoadedMetadata};
use crate::processing::{edit_file, Editor};

#[derive(Debug, Parser)]
#[command(name = "mp3tageditor", version, about = "Edit MP3 title/album/artist tags and cover art")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Verify that ffprobe and ffmpeg can be found
    Check,
    /// Print the tags and cover information of a file
    Show {
        file: PathBuf,
        /// Print JSON (cover as base64)
        #[arg(long)]
        json: bool,
        /// Write the embedded cover to this path
        #[arg(long, value_name = "PATH")]
        export_cover: Option<PathBuf>,
        /// Keep a copy of the embedded cover in the user cache
        #[arg(long)]
        cache_cover: bool,
    },
    /// Change tags and/or cover and save the file as `<title>.mp3`
    Edit {
        file: PathBuf,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        album: Option<String>,
        #[arg(long)]
        artist: Option<String>,
        /// Replace the cover with this image file
        #[arg(long, value_name = "IMAGE", conflicts_with = "remove_cover")]
        cover: Option<PathBuf>,
        /// Save without cover art
        #[arg(long)]
        remove_cover: bool,
    },
    /// List MP3 files below a directory
    Scan {
        dir: PathBuf,
        /// Probe every file and print JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Serialize)]
struct ShowView<'a> {
    file_path: &'a std::path::Path,
    #[serde(flatten)]
    loaded: &'a LoadedMetadata,
}

pub async fn execute(cli: Cli, editor: Editor) -> anyhow::Result<()> {
    match cli.command {
        Command::Check => {
            editor.check_tools()?;
            println!("ffprobe and ffmpeg found");
        }
        Command::Show {
            file,
            json,
            export_cover: export_path,
            cache_cover,
        } => {
            ensure_file(&file)?;
            let handle = editor.open(&file);
            let asset = editor.submit_load(&handle)?.wait().await?;
            let loaded = LoadedMetadata {
                metadata: asset.metadata,
                cover: asset.cover,
            };

            if json {
                let view = ShowView {
                    file_path: &file,
                    loaded: &loaded,
                };
                println!("{}", serde_json::to_string_pretty(&view)?);
            } else {
                print_loaded(&loaded);
            }

            if let Some(cover) = &loaded.cover {
                if let Some(path) = export_path {
                    export_cover(cover, &path).await?;
                    info!("cover written to {}", path.display());
                }
                if cache_cover {
                    let cached = save_cover_to_cache(cover, &loaded.metadata).await?;
                    info!("cover cached at {}", cached.display());
                }
            } else if export_path.is_some() || cache_cover {
                bail!("{} has no embedded cover", file.display());
            }
        }
        Command::Edit {
            file,
            title,
            album,
            artist,
            cover,
            remove_cover,
        } => {
            ensure_file(&file)?;
            editor.check_tools()?;
            let new_cover = match &cover {
                Some(path) => Some(CoverImage::from_file(path).await?),
                None => None,
            };

            let saved = edit_file(&editor, &file, |metadata, current_cover| {
                if let Some(title) = title {
                    metadata.title = title;
                }
                if let Some(album) = album {
                    metadata.album = album;
                }
                if let Some(artist) = artist {
                    metadata.artist = artist;
                }
                if remove_cover {
                    *current_cover = None;
                } else if new_cover.is_some() {
                    *current_cover = new_cover;
                }
            })
            .await
            .with_context(|| format!("failed to save {}", file.display()))?;
            println!("{}", saved.display());
        }
        Command::Scan { dir, json } => {
            let files = scan_directory_for_audio_files(&dir)?;
            if json {
                let results = editor.load_many(files).await;
                println!("{}", serde_json::to_string_pretty(&results)?);
            } else {
                for file in files {
                    println!("{}", file.display());
                }
            }
        }
    }
    Ok(())
}

fn ensure_file(path: &std::path::Path) -> anyhow::Result<()> {
    if !path.is_file() {
        bail!("ファイルが見つかりません: {}", path.display());
    }
    Ok(())
}

fn print_loaded(loaded: &LoadedMetadata) {
    println!("title:  {}", loaded.metadata.title);
    println!("album:  {}", loaded.metadata.album);
    println!("artist: {}", loaded.metadata.artist);
    match &loaded.cover {
        Some(cover) => println!(
            "cover:  {}, {} bytes",
            cover.mime_type().unwrap_or("unknown"),
            cover.len()
        ),
        None => println!("cover:  none"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn edit_arguments_parse() {
        let cli = Cli::try_parse_from([
            "mp3tageditor",
            "edit",
            "song.mp3",
            "--title",
            "New Name",
            "--album",
            "A",
            "--remove-cover",
        ])
        .unwrap();
        match cli.command {
            Command::Edit {
                file,
                title,
                album,
                artist,
                cover,
                remove_cover,
            } => {
                assert_eq!(file, PathBuf::from("song.mp3"));
                assert_eq!(title.as_deref(), Some("New Name"));
                assert_eq!(album.as_deref(), Some("A"));
                assert_eq!(artist, None);
                assert_eq!(cover, None);
                assert!(remove_cover);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn edit_renames_and_drops_cover() {
        use std::ffi::OsStr;

        use crate::config::EditorConfig;
        use crate::testing::{read_media, write_media, FakeTools};

        let tmp = tempfile::TempDir::new().unwrap();
        let song = tmp.path().join("song.mp3");
        write_media(&song, &[("album", "Keep")], Some(b"art"));
        let config = EditorConfig {
            ffprobe_path: PathBuf::from("/bin/sh"),
            ffmpeg_path: PathBuf::from("/bin/sh"),
            scratch_dir: tmp.path().join(".temp"),
            ..EditorConfig::default()
        };
        let editor = Editor::with_runner(config, FakeTools::new());
        let cli = Cli::try_parse_from([
            OsStr::new("mp3tageditor"),
            OsStr::new("edit"),
            song.as_os_str(),
            OsStr::new("--title"),
            OsStr::new("New Name"),
            OsStr::new("--remove-cover"),
        ])
        .unwrap();

        execute(cli, editor).await.unwrap();

        let saved = read_media(&tmp.path().join("New Name.mp3")).unwrap();
        assert_eq!(saved.tag("title"), Some("New Name"));
        assert_eq!(saved.tag("album"), Some("Keep"));
        assert_eq!(saved.cover, None);
        assert!(!song.exists());
    }

    #[test]
    fn cover_and_remove_cover_conflict() {
        let result = Cli::try_parse_from([
            "mp3tageditor",
            "edit",
            "song.mp3",
            "--cover",
            "art.jpg",
            "--remove-cover",
        ]);
        assert!(result.is_err());
    }
}
