mod mutate;
