fn main() -> anyhow::Result<()> {
    mp3tageditor_lib::run()
}
