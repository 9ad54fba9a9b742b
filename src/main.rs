fn main() -> anyhow::Result<()> {
    snaptext_lib::run()
}
