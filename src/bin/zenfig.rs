fn main() -> color_eyre::Result<()> {
    zenfig::cli::main()
}
